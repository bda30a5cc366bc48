use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovgateError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load coverage report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        source: Box<CovgateError>,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format for {}; pass --format", .0.display())]
    UnknownFormat(PathBuf),

    #[error("Invalid threshold {0}: must be a percentage between 0 and 100")]
    InvalidThreshold(f64),

    #[error(
        "Coverage report {} has no line-level data; use --summary-path or --policy per-file",
        .0.display()
    )]
    MissingLineData(PathBuf),
}

pub type Result<T> = std::result::Result<T, CovgateError>;

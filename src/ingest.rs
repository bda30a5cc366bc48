use std::path::Path;

use crate::detect::{detect_format, Format};
use crate::error::{CovgateError, Result};
use crate::model::{CoverageData, CoverageReport};
use crate::parsers::parser_for;

/// Read a coverage file, auto-detect its format (or use the override),
/// parse it, and validate it into a [`CoverageReport`].
/// Returns the report and the format it was read as.
///
/// Every failure past the initial read is wrapped with the file path.
pub fn load_report(
    file_path: &Path,
    format_override: Option<Format>,
    source_root: Option<&str>,
) -> Result<(CoverageReport, Format)> {
    let content = std::fs::read(file_path).map_err(|source| CovgateError::Read {
        path: file_path.to_path_buf(),
        source,
    })?;

    let format = match format_override {
        Some(format) => format,
        None => detect_format(file_path, &content)
            .ok_or_else(|| CovgateError::UnknownFormat(file_path.to_path_buf()))?,
    };

    let data = parse_with_format(format, &content).map_err(|source| CovgateError::Report {
        path: file_path.to_path_buf(),
        source: Box::new(source),
    })?;

    if data.files.is_empty() {
        eprintln!(
            "Warning: coverage report {} contains no files",
            file_path.display()
        );
    }

    Ok((CoverageReport::from_data(data, source_root), format))
}

fn parse_with_format(format: Format, content: &[u8]) -> Result<CoverageData> {
    parser_for(format).parse(content)
}

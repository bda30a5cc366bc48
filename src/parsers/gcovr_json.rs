/// Parser for gcovr JSON reports.
///
/// Reference: https://gcovr.com/en/stable/output/json.html
///
/// Accepts both the detailed `--json` output and `--json-summary`:
///
/// ```json
/// {
///   "line_percent": 81.3,
///   "files": [
///     {
///       "file": "common/Flags.cpp",
///       "line_percent": 75.0,
///       "lines": [ { "line_number": 12, "count": 3, "gcovr/noncode": false } ]
///     }
///   ]
/// }
/// ```
///
/// Summary files name the path `filename` instead of `file` and carry no
/// `lines`. Lines flagged `gcovr/noncode` are not instrumented.
use serde::Deserialize;

use crate::error::Result;
use crate::model::*;
use crate::parsers::Parser;

pub struct GcovrJsonParser;

impl Parser for GcovrJsonParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

#[derive(Deserialize)]
struct JsonReport {
    #[serde(default)]
    line_percent: Option<f64>,
    #[serde(default)]
    files: Vec<JsonFile>,
}

#[derive(Deserialize)]
struct JsonFile {
    #[serde(alias = "filename")]
    file: String,
    #[serde(default)]
    line_percent: Option<f64>,
    #[serde(default)]
    lines: Vec<JsonLine>,
}

#[derive(Deserialize)]
struct JsonLine {
    line_number: u32,
    count: u64,
    #[serde(rename = "gcovr/noncode", default)]
    noncode: bool,
}

/// Parse a gcovr JSON report from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let report: JsonReport = serde_json::from_slice(input)?;

    let files = report
        .files
        .into_iter()
        .map(|f| FileCoverage {
            path: f.file,
            lines: f
                .lines
                .into_iter()
                .filter(|l| !l.noncode)
                .map(|l| LineCoverage {
                    line_number: l.line_number,
                    hit_count: l.count,
                })
                .collect(),
            percent: f.line_percent,
        })
        .collect();

    Ok(CoverageData {
        files,
        line_percent: report.line_percent,
    })
}

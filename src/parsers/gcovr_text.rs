/// Parser for gcovr's default tabular text report.
///
/// ```text
/// ------------------------------------------------------------------------------
///                            GCC Code Coverage Report
/// Directory: .
/// ------------------------------------------------------------------------------
/// File                                       Lines    Exec  Cover   Missing
/// ------------------------------------------------------------------------------
/// common/Flags.cpp                              24      20    83%   12,15-17
/// config_manager/a_rather_long_directory/ConfigManager.cpp
///                                              410     120    29%   33-40,52
/// plugin/empty.cpp                               0       0    --%
/// ------------------------------------------------------------------------------
/// TOTAL                                        500     400    80%
/// ------------------------------------------------------------------------------
/// ```
///
/// Only the per-file percentage column is used, so the result carries
/// stated percentages and no line data. Filenames too long for the column
/// are printed on their own line, with the numbers on the next, indented
/// line. Files with no executable lines (`--%`) are left out.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CovgateError, Result};
use crate::model::*;
use crate::parsers::Parser;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+(?:\.\d+)?)|--)%$").unwrap());

pub struct GcovrTextParser;

impl Parser for GcovrTextParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// A table row: the path (absent on a wrapped continuation line) and the
/// stated percentage (absent for `--%`).
struct Row<'a> {
    path: Option<&'a str>,
    percent: Option<f64>,
}

/// Parse a gcovr text report from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let text = std::str::from_utf8(input)
        .map_err(|e| CovgateError::Parse(format!("Invalid UTF-8 in coverage table: {e}")))?;

    let mut data = CoverageData::new();
    // Filename printed alone on the previous line.
    let mut pending_path: Option<&str> = None;

    for line in text.lines() {
        let Some(row) = parse_row(line) else {
            let trimmed = line.trim();
            let single_token = !trimmed.is_empty() && !trimmed.contains(char::is_whitespace);
            pending_path = (single_token
                && !line.starts_with(char::is_whitespace)
                && !trimmed.starts_with("---"))
            .then_some(trimmed);
            continue;
        };

        let path = match row.path {
            Some(path) => path,
            None => match pending_path {
                Some(path) => path,
                None => continue,
            },
        };
        pending_path = None;

        if path == "TOTAL" {
            data.line_percent = row.percent;
        } else if let Some(percent) = row.percent {
            let mut file = FileCoverage::new(path.to_string());
            file.percent = Some(percent);
            data.files.push(file);
        }
    }

    Ok(data)
}

/// Recognize `path lines exec pct% [missing]` or, for a wrapped filename,
/// `    lines exec pct% [missing]`.
fn parse_row(line: &str) -> Option<Row<'_>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let pct_idx = tokens.iter().position(|t| PERCENT_RE.is_match(t))?;

    let continuation = line.starts_with(char::is_whitespace);
    let (path, counts) = if continuation {
        (None, &tokens[..pct_idx])
    } else {
        (Some(*tokens.first()?), tokens.get(1..pct_idx)?)
    };
    if counts.is_empty() || !counts.iter().all(|t| t.parse::<u64>().is_ok()) {
        return None;
    }

    let caps = PERCENT_RE.captures(tokens[pct_idx])?;
    let percent = match caps.get(1) {
        Some(value) => Some(value.as_str().parse::<f64>().ok()?),
        None => None,
    };
    Some(Row { path, percent })
}

/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Only line records matter for a diff gate:
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   end_of_record
///
/// Function and branch records (FN, FNDA, BRDA, ...) and the LF/LH summary
/// lines are skipped.
use crate::error::{CovgateError, Result};
use crate::model::*;
use crate::parsers::Parser;

/// LCOV format parser.
pub struct LcovParser;

impl Parser for LcovParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse LCOV format coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let text = std::str::from_utf8(input)
        .map_err(|e| CovgateError::Parse(format!("Invalid UTF-8 in LCOV data: {e}")))?;

    let mut data = CoverageData::new();
    let mut current_file: Option<FileCoverage> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(file) = current_file.take() {
                data.files.push(file);
            }
            continue;
        }

        // Split on first ':'
        let Some((tag, value)) = line.split_once(':') else {
            continue; // Skip lines we don't understand
        };

        match tag {
            "SF" => {
                if let Some(file) = current_file.replace(FileCoverage::new(value.to_string())) {
                    // Previous record was missing its end_of_record.
                    data.files.push(file);
                }
            }
            "DA" => {
                // Some instrumenters use negative counts (e.g., -1) to indicate
                // non-instrumentable lines. We skip those entirely.
                let Some(file) = current_file.as_mut() else {
                    continue;
                };
                let mut parts = value.splitn(3, ',');
                let (Some(line_str), Some(count_str)) = (parts.next(), parts.next()) else {
                    continue;
                };
                if let (Ok(line_number), Ok(count)) =
                    (line_str.parse::<u32>(), count_str.parse::<i64>())
                {
                    if count >= 0 {
                        file.lines.push(LineCoverage {
                            line_number,
                            hit_count: count as u64,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    // Handle case where file ends without end_of_record
    if let Some(file) = current_file.take() {
        data.files.push(file);
    }

    Ok(data)
}

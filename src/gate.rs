//! Rate calculation and the pass/fail threshold decision.
//!
//! Two policies are supported:
//!
//! - [`Policy::Aggregate`]: one rate over every instrumented changed line
//!   in every file, computed from line-level matches.
//! - [`Policy::PerFile`]: each changed file's own line-coverage percentage,
//!   as stated by the report, must meet the threshold on its own.

use clap::ValueEnum;

use crate::error::{CovgateError, Result};
use crate::model::{percent, ChangedLineSet, CoverageReport, FileMatch};

/// How the threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Policy {
    /// Single rate across all changed, instrumented lines.
    #[default]
    Aggregate,
    /// Every changed file's own coverage percentage.
    PerFile,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Aggregate => "aggregate",
            Policy::PerFile => "per-file",
        }
    }
}

/// Outcome of the rate calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// No changed line is instrumented: nothing to be penalized for.
    NoLineToCover,
    /// Percentage in `[0, 100]`.
    Percent(f64),
}

/// A changed file's stated coverage percentage (per-file policy).
#[derive(Debug, Clone, PartialEq)]
pub struct FileRate {
    pub path: String,
    pub percent: f64,
}

/// A file that fell short of the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub path: String,
    pub percent: f64,
    /// Changed lines that are instrumented but never executed. Empty when
    /// the report has no line-level data for the file.
    pub uncovered_lines: Vec<u32>,
}

/// The gate's decision plus everything needed to explain it.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub policy: Policy,
    pub threshold: f64,
    pub rate: Rate,
    pub passed: bool,
    pub shortfalls: Vec<Shortfall>,
    /// Line matches for every changed file present in the report.
    pub files: Vec<FileMatch>,
    /// Per-file percentages (per-file policy only).
    pub file_rates: Vec<FileRate>,
}

impl Verdict {
    #[must_use]
    pub fn covered_total(&self) -> usize {
        self.files.iter().map(|f| f.covered_lines.len()).sum()
    }

    #[must_use]
    pub fn uncovered_total(&self) -> usize {
        self.files.iter().map(|f| f.uncovered_lines.len()).sum()
    }
}

/// Aggregate rate across all matched files.
pub fn aggregate_rate(files: &[FileMatch]) -> Rate {
    let covered: usize = files.iter().map(|f| f.covered_lines.len()).sum();
    let uncovered: usize = files.iter().map(|f| f.uncovered_lines.len()).sum();
    let total = covered + uncovered;
    if total == 0 {
        Rate::NoLineToCover
    } else {
        Rate::Percent(percent(covered as u64, total as u64))
    }
}

/// Stated percentage of every changed file that appears in the report.
/// Files without a stated or derivable percentage are skipped.
pub fn per_file_rates(changed: &ChangedLineSet, report: &CoverageReport) -> Vec<FileRate> {
    changed
        .keys()
        .filter_map(|path| {
            let percent = report.get(path)?.line_percent()?;
            Some(FileRate {
                path: path.clone(),
                percent,
            })
        })
        .collect()
}

/// Compares rates against a minimum percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdGate {
    threshold: f64,
}

impl ThresholdGate {
    /// `threshold` is a percentage and must lie in `[0, 100]`.
    pub fn new(threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(CovgateError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Aggregate policy: pass when the overall rate meets the threshold or
    /// there is no line to cover. On failure every file with uncovered
    /// lines is listed.
    pub fn evaluate_aggregate(&self, files: Vec<FileMatch>) -> Verdict {
        let rate = aggregate_rate(&files);
        let passed = match rate {
            Rate::NoLineToCover => true,
            Rate::Percent(p) => p >= self.threshold,
        };

        let shortfalls = if passed {
            Vec::new()
        } else {
            files
                .iter()
                .filter(|f| !f.uncovered_lines.is_empty())
                .map(|f| Shortfall {
                    path: f.path.clone(),
                    percent: f.percent(),
                    uncovered_lines: f.uncovered_lines.clone(),
                })
                .collect()
        };

        Verdict {
            policy: Policy::Aggregate,
            threshold: self.threshold,
            rate,
            passed,
            shortfalls,
            files,
            file_rates: Vec::new(),
        }
    }

    /// Per-file policy: every file below the threshold is a shortfall. The
    /// reported rate is the lowest file percentage; with no matched files
    /// there is no line to cover.
    ///
    /// `files` supplies uncovered line numbers for the diagnostics when the
    /// report has line-level data.
    pub fn evaluate_per_file(&self, file_rates: Vec<FileRate>, files: Vec<FileMatch>) -> Verdict {
        let rate = file_rates
            .iter()
            .map(|r| r.percent)
            .min_by(f64::total_cmp)
            .map_or(Rate::NoLineToCover, Rate::Percent);

        let shortfalls: Vec<Shortfall> = file_rates
            .iter()
            .filter(|r| r.percent < self.threshold)
            .map(|r| Shortfall {
                path: r.path.clone(),
                percent: r.percent,
                uncovered_lines: files
                    .iter()
                    .find(|f| f.path == r.path)
                    .map(|f| f.uncovered_lines.clone())
                    .unwrap_or_default(),
            })
            .collect();

        Verdict {
            policy: Policy::PerFile,
            threshold: self.threshold,
            rate,
            passed: shortfalls.is_empty(),
            shortfalls,
            files,
            file_rates,
        }
    }
}

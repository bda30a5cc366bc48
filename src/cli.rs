//! The gate command.
//!
//! [`cmd_gate`] returns its output as a `String`, making it easy to test
//! without capturing stdout or spawning git.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::ValueEnum;

use crate::detect::Format;
use crate::diff::{self, SkippedLine};
use crate::error::CovgateError;
use crate::gate::{per_file_rates, Policy, ThresholdGate};
use crate::ingest::load_report;
use crate::matcher::match_report;
use crate::report::{GateReport, MarkdownFormatter, ReportFormatter, TextFormatter};

/// Output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Markdown,
}

/// Coverage report format as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Auto,
    Json,
    Lcov,
    Cobertura,
    Text,
}

impl FormatArg {
    /// The forced format, or `None` to auto-detect.
    #[must_use]
    pub fn format(self) -> Option<Format> {
        match self {
            FormatArg::Auto => None,
            FormatArg::Json => Some(Format::Json),
            FormatArg::Lcov => Some(Format::Lcov),
            FormatArg::Cobertura => Some(Format::Cobertura),
            FormatArg::Text => Some(Format::Text),
        }
    }
}

/// Everything the gate needs besides the diff text.
#[derive(Debug, Clone)]
pub struct GateOptions {
    /// Coverage report (any supported format).
    pub path: Option<PathBuf>,
    /// Line-level JSON report; preferred by the aggregate policy.
    pub summary_path: Option<PathBuf>,
    pub threshold: f64,
    pub policy: Policy,
    pub format: FormatArg,
    pub subtree: Option<String>,
    pub path_prefix: Option<String>,
    pub source_root: Option<String>,
    pub style: Style,
    pub sha: Option<String>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            path: None,
            summary_path: None,
            threshold: 80.0,
            policy: Policy::Aggregate,
            format: FormatArg::Auto,
            subtree: None,
            path_prefix: None,
            source_root: None,
            style: Style::Text,
            sha: None,
        }
    }
}

impl GateOptions {
    /// The report the selected policy reads.
    fn report_path(&self) -> Option<&PathBuf> {
        match self.policy {
            Policy::Aggregate => self.summary_path.as_ref().or(self.path.as_ref()),
            Policy::PerFile => self.path.as_ref().or(self.summary_path.as_ref()),
        }
    }

    /// Check the threshold and that the selected report exists, so a bad
    /// invocation fails before any diff is fetched.
    pub fn validate(&self) -> Result<(ThresholdGate, &Path)> {
        let gate = ThresholdGate::new(self.threshold)?;
        let Some(report_path) = self.report_path() else {
            bail!("a coverage report is required (--path or --summary-path)");
        };
        std::fs::metadata(report_path).map_err(|source| CovgateError::Read {
            path: report_path.clone(),
            source,
        })?;
        Ok((gate, report_path.as_path()))
    }
}

/// Result of running the gate.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Rendered report.
    pub output: String,
    pub passed: bool,
    /// Diff lines that were ignored as malformed.
    pub skipped: Vec<SkippedLine>,
}

/// Core gate logic. Accepts the diff text directly so callers can obtain it
/// from stdin, a file, or `git diff`.
pub fn cmd_gate(diff_text: &str, opts: &GateOptions) -> Result<GateOutcome> {
    let (gate, report_path) = opts.validate()?;

    let parsed = diff::parse_diff(diff_text);
    let mut changed = parsed.files;
    if let Some(ref subtree) = opts.subtree {
        changed = diff::restrict_to_subtree(changed, subtree);
    }
    if let Some(ref prefix) = opts.path_prefix {
        changed = diff::apply_path_prefix(changed, prefix);
    }
    let diff_files = changed.len();
    let diff_lines = changed.values().map(Vec::len).sum();

    let (report, report_format) = load_report(
        report_path,
        opts.format.format(),
        opts.source_root.as_deref(),
    )?;

    let matches = match_report(&changed, &report);
    let verdict = match opts.policy {
        Policy::Aggregate => {
            if !report.is_empty() && !report.has_line_data() {
                return Err(CovgateError::MissingLineData(report_path.to_path_buf()).into());
            }
            gate.evaluate_aggregate(matches)
        }
        Policy::PerFile => gate.evaluate_per_file(per_file_rates(&changed, &report), matches),
    };

    let passed = verdict.passed;
    let gate_report = GateReport {
        verdict,
        diff_files,
        diff_lines,
        report_format,
        project_percent: report.project_percent(),
        sha: opts.sha.clone(),
    };
    let formatter: &dyn ReportFormatter = match opts.style {
        Style::Text => &TextFormatter,
        Style::Markdown => &MarkdownFormatter,
    };

    Ok(GateOutcome {
        output: gate_report.format(formatter),
        passed,
        skipped: parsed.skipped,
    })
}

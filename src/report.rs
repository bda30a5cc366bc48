//! Output formatting for gate verdicts.

use std::fmt::Write;

use crate::detect::Format;
use crate::gate::{Policy, Rate, Shortfall, Verdict};
use crate::model::FileMatch;

/// A verdict together with the diff context needed to explain it.
pub struct GateReport {
    pub verdict: Verdict,
    /// Number of files in the diff.
    pub diff_files: usize,
    /// Total number of changed lines across all files.
    pub diff_lines: usize,
    /// Format the coverage report was read as.
    pub report_format: Format,
    /// Overall project line coverage percentage (if available).
    pub project_percent: Option<f64>,
    /// Commit SHA used to link missed lines in markdown output.
    pub sha: Option<String>,
}

impl GateReport {
    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

/// Trait for formatting gate reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &GateReport) -> String;
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &GateReport) -> String {
        let mut out = String::new();
        let verdict = &report.verdict;

        let policy = verdict.policy.as_str();
        let threshold = verdict.threshold;
        let format = report.report_format;
        writeln!(
            out,
            "Policy: {policy}, threshold {threshold:.1}%, {format} report"
        )
        .unwrap();
        out.push('\n');

        match (verdict.policy, verdict.rate) {
            (_, Rate::NoLineToCover) => {
                let lines = report.diff_lines;
                let files = report.diff_files;
                writeln!(
                    out,
                    "No line to cover: {lines} changed lines across {files} files, none instrumented."
                )
                .unwrap();
            }
            (Policy::Aggregate, Rate::Percent(pct)) => {
                let covered = verdict.covered_total();
                let total = covered + verdict.uncovered_total();
                writeln!(
                    out,
                    "Diff coverage: {pct:.1}% ({covered}/{total} lines covered)"
                )
                .unwrap();

                out.push('\n');
                for f in sorted_by_rate(&verdict.files) {
                    let file_total = f.total();
                    let file_covered = f.covered_lines.len();
                    let file_rate = f.percent();
                    let path = &f.path;
                    writeln!(
                        out,
                        "  {path}  {file_covered}/{file_total} ({file_rate:.1}%)"
                    )
                    .unwrap();
                    let all_instrumentable = f.all_instrumentable();
                    if !f.covered_lines.is_empty() {
                        let covered = format_line_ranges(&f.covered_lines, &all_instrumentable);
                        writeln!(out, "    covered:   {covered}").unwrap();
                    }
                    if !f.uncovered_lines.is_empty() {
                        let missed = format_line_ranges(&f.uncovered_lines, &all_instrumentable);
                        writeln!(out, "    uncovered: {missed}").unwrap();
                    }
                }
            }
            (Policy::PerFile, Rate::Percent(_)) => {
                writeln!(out, "Coverage of changed files:").unwrap();
                out.push('\n');
                for r in &verdict.file_rates {
                    let path = &r.path;
                    let pct = r.percent;
                    let marker = if pct < verdict.threshold { "  below threshold" } else { "" };
                    writeln!(out, "  {path}  {pct:.1}%{marker}").unwrap();
                }
            }
        }

        if let Some(pct) = report.project_percent {
            out.push('\n');
            writeln!(out, "Full project coverage: {pct:.1}%").unwrap();
        }

        if !verdict.passed {
            out.push('\n');
            writeln!(out, "Files below threshold:").unwrap();
            for s in &verdict.shortfalls {
                let path = &s.path;
                let pct = s.percent;
                if s.uncovered_lines.is_empty() {
                    writeln!(out, "  {path}  {pct:.1}%").unwrap();
                } else {
                    let instrumented = instrumented_lines(verdict, s);
                    let lines = format_line_ranges(&s.uncovered_lines, &instrumented);
                    writeln!(out, "  {path}  {pct:.1}%  uncovered: {lines}").unwrap();
                }
            }
        }

        out.push('\n');
        out.push_str(&banner(verdict));
        out.push('\n');
        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &GateReport) -> String {
        let mut md = String::new();
        let verdict = &report.verdict;
        let icon = if verdict.passed { "✅" } else { "❌" };

        match verdict.rate {
            Rate::NoLineToCover => {
                writeln!(md, "### {icon} Diff Coverage: no line to cover\n").unwrap();
            }
            Rate::Percent(pct) => {
                let label = match verdict.policy {
                    Policy::Aggregate => "Diff Coverage",
                    Policy::PerFile => "Lowest File Coverage",
                };
                writeln!(md, "### {icon} {label}: {pct:.1}%\n").unwrap();
            }
        }

        if verdict.policy == Policy::Aggregate {
            let covered = verdict.covered_total();
            let total = covered + verdict.uncovered_total();
            write!(md, "**{covered}** of **{total}** changed lines covered").unwrap();
            if let Some(ref sha) = report.sha {
                let short_sha = sha.get(..7).unwrap_or(sha.as_str());
                write!(md, " ({short_sha})").unwrap();
            }
            md.push('\n');
        }
        let threshold = verdict.threshold;
        writeln!(md, "\nThreshold: **{threshold:.1}%**").unwrap();

        if verdict.shortfalls.is_empty() {
            if verdict.rate != Rate::NoLineToCover {
                md.push_str("\nAll changed files meet the threshold! 🎉\n");
            }
        } else {
            md.push_str("\n| File | Coverage | Uncovered |\n");
            md.push_str("|:-----|---------:|----------:|\n");
            for s in &verdict.shortfalls {
                let path = &s.path;
                let pct = s.percent;
                let missed = s.uncovered_lines.len();
                writeln!(md, "| `{path}` | {pct:.0}% | {missed} |").unwrap();
            }

            let with_lines: Vec<_> = verdict
                .shortfalls
                .iter()
                .filter(|s| !s.uncovered_lines.is_empty())
                .collect();
            if !with_lines.is_empty() {
                md.push_str("\n<details>\n<summary>Uncovered lines</summary>\n\n");
                for s in with_lines {
                    let path = &s.path;
                    let instrumented = instrumented_lines(verdict, s);
                    let ranges = match report.sha {
                        Some(ref sha) => {
                            format_line_ranges_linked(&s.uncovered_lines, &instrumented, sha, path)
                        }
                        None => format_line_ranges(&s.uncovered_lines, &instrumented),
                    };
                    writeln!(md, "**`{path}`**: {ranges}\n").unwrap();
                }
                md.push_str("</details>\n");
            }
        }

        if let Some(pct) = report.project_percent {
            md.push('\n');
            writeln!(md, "<sub>Full project coverage: **{pct:.1}%**</sub>").unwrap();
        }

        md
    }
}

/// One-line pass/fail summary.
#[must_use]
pub fn banner(verdict: &Verdict) -> String {
    let threshold = verdict.threshold;
    let status = if verdict.passed { "PASSED" } else { "FAILED" };
    match (verdict.policy, verdict.rate) {
        (_, Rate::NoLineToCover) => format!("{status}: no line to cover"),
        (Policy::Aggregate, Rate::Percent(pct)) => {
            let cmp = if verdict.passed { ">=" } else { "<" };
            format!("{status}: diff coverage {pct:.1}% {cmp} threshold {threshold:.1}%")
        }
        (Policy::PerFile, Rate::Percent(_)) => {
            let below = verdict.shortfalls.len();
            format!("{status}: {below} changed files below threshold {threshold:.1}%")
        }
    }
}

/// Every instrumented changed line of a shortfall's file, covered or not.
fn instrumented_lines(verdict: &Verdict, shortfall: &Shortfall) -> Vec<u32> {
    verdict
        .files
        .iter()
        .find(|f| f.path == shortfall.path)
        .map_or_else(|| shortfall.uncovered_lines.clone(), FileMatch::all_instrumentable)
}

/// Files ordered worst-first, ties broken by path.
fn sorted_by_rate(files: &[FileMatch]) -> Vec<&FileMatch> {
    let mut sorted: Vec<&FileMatch> = files.iter().filter(|f| f.total() > 0).collect();
    sorted.sort_by(|a, b| {
        a.percent()
            .total_cmp(&b.percent())
            .then_with(|| a.path.cmp(&b.path))
    });
    sorted
}

/// Maximum number of consecutive non-instrumentable lines that can be bridged
/// when coalescing ranges. Gaps of up to this many lines (where none of the
/// gap lines are instrumentable) are merged into a single range.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging small
/// gaps where every line in the gap is non-instrumentable.
///
/// A gap between two lines is bridged only when:
/// 1. Every line in the gap is absent from `all_instrumentable`, AND
/// 2. The gap is at most [`MAX_BRIDGE_GAP`] lines wide.
///
/// Both `lines` and `all_instrumentable` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], all_instrumentable: &[u32]) -> Vec<(u32, u32)> {
    let Some((&first, rest)) = lines.split_first() else {
        return Vec::new();
    };

    debug_assert!(
        lines.windows(2).all(|w| w[0] < w[1]),
        "coalesce_ranges requires sorted, deduplicated input"
    );

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut start = first;
    let mut end = first;

    for &line in rest {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP
            && (end + 1..line).all(|l| all_instrumentable.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation with markdown links.
///
/// Each line number becomes a link like `[N](../blob/{sha}/{path}#LN)`.
/// Ranges are rendered as `[3-5](../blob/{sha}/{path}#L3-L5)`.
#[must_use]
pub fn format_line_ranges_linked(
    lines: &[u32],
    all_instrumentable: &[u32],
    sha: &str,
    path: &str,
) -> String {
    coalesce_ranges(lines, all_instrumentable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                format!("[{start}](../blob/{sha}/{path}#L{start})")
            } else {
                format!("[{start}-{end}](../blob/{sha}/{path}#L{start}-L{end})")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(lines: &[u32], all_instrumentable: &[u32]) -> String {
    coalesce_ranges(lines, all_instrumentable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

//! Intersect changed lines with instrumented lines.
//!
//! Both sequences are ascending, so a single two-cursor merge classifies
//! every changed line that the report instruments. Changed lines the report
//! does not mention (blank lines, comments, braces) fall out of both the
//! numerator and the denominator, as do instrumented lines nobody touched.

use std::borrow::Cow;

use crate::model::{ChangedLineSet, CoverageReport, FileMatch, LineCoverage};

/// Match one file's changed lines against its coverage lines.
///
/// Inputs that are not strictly ascending are sorted (and deduplicated)
/// into a private copy first; an unsorted merge would silently drop
/// matches.
pub fn match_lines(path: &str, changed: &[u32], coverage: &[LineCoverage]) -> FileMatch {
    let changed = ascending_changed(changed);
    let coverage = ascending_coverage(coverage);

    let mut covered_lines = Vec::new();
    let mut uncovered_lines = Vec::new();

    let (mut i, mut j) = (0, 0);
    while i < coverage.len() && j < changed.len() {
        let line = coverage[i];
        match line.line_number.cmp(&changed[j]) {
            std::cmp::Ordering::Equal => {
                if line.is_covered() {
                    covered_lines.push(line.line_number);
                } else {
                    uncovered_lines.push(line.line_number);
                }
                i += 1;
                j += 1;
            }
            // Instrumented but not changed.
            std::cmp::Ordering::Less => i += 1,
            // Changed but not instrumented.
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    FileMatch {
        path: path.to_string(),
        covered_lines,
        uncovered_lines,
    }
}

/// Match every changed file that the report knows about, in path order.
/// Changed files absent from the report produce no entry.
pub fn match_report(changed: &ChangedLineSet, report: &CoverageReport) -> Vec<FileMatch> {
    changed
        .iter()
        .filter_map(|(path, lines)| {
            let file = report.get(path)?;
            Some(match_lines(path, lines, &file.lines))
        })
        .collect()
}

fn ascending_changed(lines: &[u32]) -> Cow<'_, [u32]> {
    if lines.windows(2).all(|w| w[0] < w[1]) {
        return Cow::Borrowed(lines);
    }
    let mut sorted = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    Cow::Owned(sorted)
}

fn ascending_coverage(lines: &[LineCoverage]) -> Cow<'_, [LineCoverage]> {
    if lines.windows(2).all(|w| w[0].line_number < w[1].line_number) {
        return Cow::Borrowed(lines);
    }
    let mut sorted = lines.to_vec();
    sorted.sort_by(|a, b| {
        a.line_number
            .cmp(&b.line_number)
            .then(b.hit_count.cmp(&a.hit_count))
    });
    sorted.dedup_by_key(|l| l.line_number);
    Cow::Owned(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageData, FileCoverage};

    fn cov(lines: &[(u32, u64)]) -> Vec<LineCoverage> {
        lines
            .iter()
            .map(|&(line_number, hit_count)| LineCoverage {
                line_number,
                hit_count,
            })
            .collect()
    }

    #[test]
    fn test_match_classifies_hits() {
        let m = match_lines("x", &[10, 11, 12], &cov(&[(10, 1), (11, 0), (12, 1)]));
        assert_eq!(m.covered_lines, vec![10, 12]);
        assert_eq!(m.uncovered_lines, vec![11]);
    }

    #[test]
    fn test_match_skips_uninstrumented_and_untouched() {
        // 3 and 9 are instrumented but unchanged; 5 is changed but not
        // instrumented; 20 is past the end of the report.
        let m = match_lines(
            "x",
            &[4, 5, 7, 20],
            &cov(&[(3, 1), (4, 0), (7, 2), (9, 0)]),
        );
        assert_eq!(m.covered_lines, vec![7]);
        assert_eq!(m.uncovered_lines, vec![4]);
        assert_eq!(m.total(), 2);
    }

    #[test]
    fn test_match_empty_inputs() {
        assert_eq!(match_lines("x", &[], &cov(&[(1, 1)])).total(), 0);
        assert_eq!(match_lines("x", &[1, 2], &[]).total(), 0);
    }

    #[test]
    fn test_match_resorts_unsorted_input() {
        let sorted = match_lines("x", &[1, 2, 3], &cov(&[(1, 1), (2, 0), (3, 1)]));
        let unsorted = match_lines("x", &[3, 1, 2, 1], &cov(&[(3, 1), (1, 1), (2, 0)]));
        assert_eq!(sorted, unsorted);
    }

    #[test]
    fn test_match_report_is_independent_of_file_order() {
        let file = |path: &str, lines: &[(u32, u64)]| FileCoverage {
            path: path.to_string(),
            lines: cov(lines),
            percent: None,
        };
        let a = file("a.cc", &[(1, 1), (2, 0)]);
        let b = file("b.cc", &[(5, 0), (6, 3)]);

        let forward = CoverageReport::from_data(
            CoverageData {
                files: vec![a.clone(), b.clone()],
                line_percent: None,
            },
            None,
        );
        let backward = CoverageReport::from_data(
            CoverageData {
                files: vec![b, a],
                line_percent: None,
            },
            None,
        );

        let mut changed = ChangedLineSet::new();
        changed.insert("b.cc".to_string(), vec![5, 6]);
        changed.insert("a.cc".to_string(), vec![1, 2]);
        changed.insert("missing.cc".to_string(), vec![1]);

        let matches = match_report(&changed, &forward);
        assert_eq!(matches, match_report(&changed, &backward));
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].path, "a.cc");
        assert_eq!(matches[1].covered_lines, vec![6]);
    }
}

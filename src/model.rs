//! Uniform in-memory representation of diff and coverage data, independent
//! of any specific report format. Parsers produce a `CoverageData`, which is
//! validated into a `CoverageReport` before any matching happens.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// File path -> ascending, deduplicated line numbers added or modified in the
/// new revision.
pub type ChangedLineSet = BTreeMap<String, Vec<u32>>;

/// Compute a percentage in `[0, 100]`, returning 0.0 when the total is zero.
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// A single line that was instrumentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCoverage {
    pub line_number: u32,
    pub hit_count: u64,
}

impl LineCoverage {
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.hit_count > 0
    }
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<LineCoverage>,
    /// Line coverage percentage as stated by the report itself, when the
    /// format carries one (gcovr text tables, gcovr JSON summaries).
    pub percent: Option<f64>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// The stated percentage, or one derived from the line data.
    /// `None` when the file has neither.
    #[must_use]
    pub fn line_percent(&self) -> Option<f64> {
        if self.percent.is_some() {
            return self.percent;
        }
        if self.lines.is_empty() {
            return None;
        }
        let covered = self.lines.iter().filter(|l| l.is_covered()).count();
        Some(percent(covered as u64, self.lines.len() as u64))
    }
}

/// The raw result of parsing a single coverage file. Nothing about ordering
/// or uniqueness is guaranteed yet.
#[derive(Debug, Clone, Default)]
pub struct CoverageData {
    pub files: Vec<FileCoverage>,
    /// Project-wide line percentage, if the report states one.
    pub line_percent: Option<f64>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Validated coverage report: one entry per path, lines strictly ascending.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    files: BTreeMap<String, FileCoverage>,
    line_percent: Option<f64>,
}

impl CoverageReport {
    /// Build a report from parsed data. Duplicate file entries are merged
    /// (maximum hit count per line) and every file's lines are sorted.
    ///
    /// A merged file's stated percentage describes only one fragment, so it
    /// is dropped when line data exists and the rate is derived from the
    /// merged lines instead. Without line data the lowest stated
    /// percentage is kept.
    ///
    /// When `source_root` is given it is stripped from the front of every
    /// path, so absolute report paths can be matched against repo-relative
    /// diff paths.
    pub fn from_data(data: CoverageData, source_root: Option<&str>) -> Self {
        let mut files: BTreeMap<String, FileCoverage> = BTreeMap::new();
        let mut merged: BTreeSet<String> = BTreeSet::new();

        for mut file in data.files {
            let path = normalize_path(&file.path, source_root);
            match files.entry(path) {
                Entry::Vacant(slot) => {
                    file.path = slot.key().clone();
                    slot.insert(file);
                }
                Entry::Occupied(mut slot) => {
                    merged.insert(slot.key().clone());
                    let entry = slot.get_mut();
                    entry.lines.extend(file.lines);
                    entry.percent = match (entry.percent, file.percent) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
            }
        }

        for path in &merged {
            if let Some(file) = files.get_mut(path) {
                if !file.lines.is_empty() {
                    file.percent = None;
                }
            }
        }

        for file in files.values_mut() {
            file.lines.sort_by(|a, b| {
                a.line_number
                    .cmp(&b.line_number)
                    .then(b.hit_count.cmp(&a.hit_count))
            });
            // After the sort the highest hit count comes first for each line.
            file.lines.dedup_by_key(|l| l.line_number);
        }

        Self {
            files,
            line_percent: data.line_percent,
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether any file carries per-line hit counts.
    #[must_use]
    pub fn has_line_data(&self) -> bool {
        self.files.values().any(|f| !f.lines.is_empty())
    }

    /// Project-wide line coverage: the stated figure if there is one,
    /// otherwise computed over every instrumented line in the report.
    #[must_use]
    pub fn project_percent(&self) -> Option<f64> {
        if self.line_percent.is_some() {
            return self.line_percent;
        }
        let (covered, total) = self.files.values().fold((0u64, 0u64), |(c, t), f| {
            let hit = f.lines.iter().filter(|l| l.is_covered()).count() as u64;
            (c + hit, t + f.lines.len() as u64)
        });
        (total > 0).then(|| percent(covered, total))
    }
}

fn normalize_path(path: &str, source_root: Option<&str>) -> String {
    let path = path.strip_prefix("./").unwrap_or(path);
    match source_root {
        Some(root) => {
            let root = root.trim_end_matches('/');
            path.strip_prefix(root)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(path)
                .to_string()
        }
        None => path.to_string(),
    }
}

/// Per-file diff coverage detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    pub path: String,
    /// Changed lines that are instrumented and covered.
    pub covered_lines: Vec<u32>,
    /// Changed lines that are instrumented and NOT covered.
    pub uncovered_lines: Vec<u32>,
}

impl FileMatch {
    #[must_use]
    pub fn total(&self) -> usize {
        self.covered_lines.len() + self.uncovered_lines.len()
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        percent(self.covered_lines.len() as u64, self.total() as u64)
    }

    /// All instrumented changed lines (covered + uncovered), sorted.
    #[must_use]
    pub fn all_instrumentable(&self) -> Vec<u32> {
        let mut all: Vec<u32> = self
            .covered_lines
            .iter()
            .chain(self.uncovered_lines.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_number: u32, hit_count: u64) -> LineCoverage {
        LineCoverage {
            line_number,
            hit_count,
        }
    }

    #[test]
    fn test_percent_zero_total() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }

    #[test]
    fn test_from_data_sorts_and_merges_duplicates() {
        let data = CoverageData {
            files: vec![
                FileCoverage {
                    path: "src/a.cc".to_string(),
                    lines: vec![line(3, 0), line(1, 2)],
                    percent: None,
                },
                FileCoverage {
                    path: "./src/a.cc".to_string(),
                    lines: vec![line(3, 4), line(2, 0)],
                    percent: None,
                },
            ],
            line_percent: None,
        };
        let report = CoverageReport::from_data(data, None);
        assert_eq!(report.len(), 1);
        let file = report.get("src/a.cc").unwrap();
        assert_eq!(file.lines, vec![line(1, 2), line(2, 0), line(3, 4)]);
    }

    #[test]
    fn test_from_data_derives_percent_of_merged_fragments() {
        let mut whole = FileCoverage::new("core/a.cc".to_string());
        whole.lines = (1..=9).map(|n| line(n, 1)).collect();
        whole.percent = Some(100.0);
        let mut fragment = FileCoverage::new("core/a.cc".to_string());
        fragment.lines = vec![line(20, 0)];
        fragment.percent = Some(0.0);

        let report = CoverageReport::from_data(
            CoverageData {
                files: vec![whole, fragment],
                line_percent: None,
            },
            None,
        );
        let file = report.get("core/a.cc").unwrap();
        assert_eq!(file.lines.len(), 10);
        assert_eq!(file.percent, None);
        assert_eq!(file.line_percent(), Some(90.0));
    }

    #[test]
    fn test_from_data_keeps_lowest_stated_percent_without_lines() {
        let stated = |pct: f64| FileCoverage {
            path: "core/a.cc".to_string(),
            lines: Vec::new(),
            percent: Some(pct),
        };
        let report = CoverageReport::from_data(
            CoverageData {
                files: vec![stated(70.0), stated(40.0), stated(55.0)],
                line_percent: None,
            },
            None,
        );
        assert_eq!(report.get("core/a.cc").unwrap().line_percent(), Some(40.0));
    }

    #[test]
    fn test_single_entry_keeps_stated_percent() {
        let mut file = FileCoverage::new("a".to_string());
        file.lines = vec![line(1, 1), line(2, 0)];
        file.percent = Some(62.5);
        let report = CoverageReport::from_data(
            CoverageData {
                files: vec![file],
                line_percent: None,
            },
            None,
        );
        assert_eq!(report.get("a").unwrap().line_percent(), Some(62.5));
    }

    #[test]
    fn test_from_data_strips_source_root() {
        let mut file = FileCoverage::new("/build/repo/core/a.cc".to_string());
        file.lines.push(line(1, 1));
        let data = CoverageData {
            files: vec![file],
            line_percent: None,
        };
        let report = CoverageReport::from_data(data, Some("/build/repo/"));
        assert!(report.get("core/a.cc").is_some());
    }

    #[test]
    fn test_line_percent_prefers_stated() {
        let mut file = FileCoverage::new("a".to_string());
        assert_eq!(file.line_percent(), None);
        file.lines = vec![line(1, 1), line(2, 0)];
        assert_eq!(file.line_percent(), Some(50.0));
        file.percent = Some(90.0);
        assert_eq!(file.line_percent(), Some(90.0));
    }

    #[test]
    fn test_project_percent() {
        let mut a = FileCoverage::new("a".to_string());
        a.lines = vec![line(1, 1), line(2, 0), line(3, 1), line(4, 1)];
        let data = CoverageData {
            files: vec![a],
            line_percent: None,
        };
        let report = CoverageReport::from_data(data.clone(), None);
        assert_eq!(report.project_percent(), Some(75.0));

        let stated = CoverageData {
            line_percent: Some(42.0),
            ..data
        };
        let report = CoverageReport::from_data(stated, None);
        assert_eq!(report.project_percent(), Some(42.0));
    }
}

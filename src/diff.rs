/// Parse a unified diff to extract which lines were changed in each file.
/// This is used for computing "diff coverage": what percentage of newly
/// added/modified lines are covered by tests.
///
/// Only header metadata is inspected: `diff --git` lines establish the
/// current file, and each `@@` hunk header contributes the new-side range
/// `new_start ..= new_start + new_count - 1`. Diffs are expected to be
/// produced with `--unified=0` so that ranges contain changed lines only.
///
/// Also provides a [`DiffSource`] trait that abstracts over different
/// ways to obtain a diff (stdin, a file, git).
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::ChangedLineSet;

// ---------------------------------------------------------------------------
// Diff sources
// ---------------------------------------------------------------------------

/// A source for obtaining a unified diff.
pub trait DiffSource {
    /// Fetch the diff text.
    fn fetch_diff(&self) -> Result<String>;
}

/// Diff from stdin.
pub struct StdinDiff;

impl DiffSource for StdinDiff {
    fn fetch_diff(&self) -> Result<String> {
        std::io::read_to_string(std::io::stdin()).context("Failed to read diff from stdin")
    }
}

/// Diff stored in a file.
pub struct FileDiff {
    pub path: PathBuf,
}

impl DiffSource for FileDiff {
    fn fetch_diff(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read diff from {}", self.path.display()))
    }
}

/// Diff between two revisions, from `git diff --unified=0 <base> <head>`.
pub struct GitDiff {
    pub base: String,
    pub head: String,
    /// Restrict the diff to this path (passed after `--`).
    pub pathspec: Option<String>,
}

impl GitDiff {
    fn args(&self) -> Vec<&str> {
        let mut args = vec![
            "diff",
            "--unified=0",
            "--no-color",
            self.base.as_str(),
            self.head.as_str(),
        ];
        if let Some(ref pathspec) = self.pathspec {
            args.push("--");
            args.push(pathspec.as_str());
        }
        args
    }
}

impl DiffSource for GitDiff {
    fn fetch_diff(&self) -> Result<String> {
        eprintln!("Running git diff {} {} ...", self.base, self.head);
        let output = Command::new("git")
            .args(self.args())
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {stderr}");
        }

        String::from_utf8(output.stdout).context("git diff output not valid UTF-8")
    }
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap()
});

/// Largest new-side count accepted from a single hunk header. Larger
/// counts are treated as corrupt rather than expanded.
pub const MAX_HUNK_LINES: u32 = 1_000_000;

static QUOTED_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"(?:[^"\\]|\\.)*" "((?:[^"\\]|\\.)*)"$"#).unwrap());

/// New-file side of a hunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hunk {
    pub new_start: u32,
    pub new_count: u32,
}

impl Hunk {
    /// The line numbers this hunk covers in the new file. Empty when the
    /// count is zero (pure deletion). `None` if the range overflows.
    #[must_use]
    pub fn lines(&self) -> Option<std::ops::Range<u32>> {
        let end = self.new_start.checked_add(self.new_count)?;
        Some(self.new_start..end)
    }
}

/// Why a diff line was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Hunk header with no preceding `diff --git` header.
    HunkOutsideFile,
    /// `@@` line that does not match the hunk header grammar.
    BadHunkHeader,
    /// Hunk range overflows, or its count exceeds [`MAX_HUNK_LINES`].
    ImplausibleHunk,
    /// `diff --git` line whose paths could not be recovered.
    BadFileHeader,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::HunkOutsideFile => "hunk header before any file header",
            SkipReason::BadHunkHeader => "unparseable hunk header",
            SkipReason::ImplausibleHunk => "hunk range too large",
            SkipReason::BadFileHeader => "unparseable file header",
        })
    }
}

/// A diff line the parser ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number within the diff text.
    pub line: usize,
    pub reason: SkipReason,
}

/// Result of parsing a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDiff {
    pub files: ChangedLineSet,
    pub skipped: Vec<SkippedLine>,
}

impl ParsedDiff {
    /// Total changed lines across all files.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Parse a unified diff (e.g., `git diff -U0`) and return a map of
/// file path -> changed line numbers in the new file.
///
/// Malformed headers are skipped and recorded rather than treated as fatal.
pub fn parse_diff(diff_text: &str) -> ParsedDiff {
    let mut parsed = ParsedDiff::default();
    let mut current_file: Option<String> = None;

    for (idx, line) in diff_text.lines().enumerate() {
        let skip = |reason| SkippedLine {
            line: idx + 1,
            reason,
        };

        if let Some(rest) = line.strip_prefix("diff --git ") {
            match parse_file_header(rest) {
                Some(path) => {
                    parsed.files.entry(path.clone()).or_default();
                    current_file = Some(path);
                }
                None => {
                    current_file = None;
                    parsed.skipped.push(skip(SkipReason::BadFileHeader));
                }
            }
        } else if line.starts_with("@@") {
            let Some(file) = current_file.as_ref() else {
                parsed.skipped.push(skip(SkipReason::HunkOutsideFile));
                continue;
            };
            let Some(hunk) = parse_hunk_header(line) else {
                parsed.skipped.push(skip(SkipReason::BadHunkHeader));
                continue;
            };
            match hunk.lines() {
                Some(range) if hunk.new_count <= MAX_HUNK_LINES => {
                    parsed.files.entry(file.clone()).or_default().extend(range);
                }
                _ => parsed.skipped.push(skip(SkipReason::ImplausibleHunk)),
            }
        }
    }

    for lines in parsed.files.values_mut() {
        lines.sort_unstable();
        lines.dedup();
    }

    parsed
}

/// Parse the new-file side of a hunk header like "@@ -10,5 +20,8 @@".
/// The count defaults to 1 when omitted.
pub fn parse_hunk_header(line: &str) -> Option<Hunk> {
    let caps = HUNK_RE.captures(line)?;
    let new_start = caps[3].parse::<u32>().ok()?;
    let new_count = match caps.get(4) {
        Some(count) => count.as_str().parse::<u32>().ok()?,
        None => 1,
    };
    Some(Hunk {
        new_start,
        new_count,
    })
}

/// Extract the new path from the part of a `diff --git` line after the
/// command, e.g. `a/src/x.rs b/src/x.rs`.
fn parse_file_header(rest: &str) -> Option<String> {
    if let Some(caps) = QUOTED_HEADER_RE.captures(rest) {
        let path = unescape_quoted(&caps[1]);
        return Some(strip_vcs_prefix(&path, "b/").to_string());
    }

    // Unquoted paths may contain spaces. When old and new are the same
    // path the line is symmetric, so split it in the middle.
    if rest.len() % 2 == 1 {
        let mid = rest.len() / 2;
        if rest.is_char_boundary(mid) && rest.as_bytes()[mid] == b' ' {
            let (old, new) = (&rest[..mid], &rest[mid + 1..]);
            if strip_vcs_prefix(old, "a/") == strip_vcs_prefix(new, "b/") {
                return non_empty(strip_vcs_prefix(new, "b/"));
            }
        }
    }

    // Renames: take the last " b/" separator.
    if let Some(pos) = rest.rfind(" b/") {
        return non_empty(&rest[pos + 3..]);
    }

    // --no-prefix diffs without spaces in the paths.
    match rest.split_once(' ') {
        Some((_, new)) if !new.contains(' ') => non_empty(new),
        _ => None,
    }
}

fn strip_vcs_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix).unwrap_or(path)
}

fn non_empty(path: &str) -> Option<String> {
    (!path.is_empty()).then(|| path.to_string())
}

/// Undo git's C-style quoting of unusual path characters.
fn unescape_quoted(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(d @ b'0'..=b'7') => {
                // Octal escape for non-ASCII bytes, e.g. \303\251.
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match bytes.clone().next() {
                        Some(o @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(o - b'0');
                            bytes.next();
                        }
                        _ => break,
                    }
                }
                out.push(value as u8);
            }
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Keep only files under `subtree/` and strip that prefix, so diff paths
/// line up with coverage paths recorded relative to the subtree.
pub fn restrict_to_subtree(diff_lines: ChangedLineSet, subtree: &str) -> ChangedLineSet {
    let subtree = subtree.trim_end_matches('/');
    if subtree.is_empty() {
        return diff_lines;
    }
    let prefix = format!("{subtree}/");
    diff_lines
        .into_iter()
        .filter_map(|(path, lines)| {
            path.strip_prefix(&prefix)
                .map(|rest| (rest.to_string(), lines))
        })
        .collect()
}

/// Prepend a path prefix to all file paths in a diff result.
pub fn apply_path_prefix(diff_lines: ChangedLineSet, prefix: &str) -> ChangedLineSet {
    let prefix = prefix.trim_end_matches('/');
    diff_lines
        .into_iter()
        .map(|(path, lines)| (format!("{prefix}/{path}"), lines))
        .collect::<BTreeMap<_, _>>()
}

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Absolute path to a file under `tests/fixtures/`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// A gcovr JSON summary with line-level data for a single file.
pub fn summary_json(file: &str, lines: &[(u32, u64)]) -> String {
    let lines: Vec<String> = lines
        .iter()
        .map(|(line, count)| format!(r#"{{"line_number": {line}, "count": {count}}}"#))
        .collect();
    format!(
        r#"{{"files": [{{"file": "{file}", "lines": [{}]}}]}}"#,
        lines.join(", ")
    )
}

/// A `git diff --unified=0` for one file with a single hunk.
pub fn single_hunk_diff(file: &str, new_start: u32, new_count: u32) -> String {
    let mut diff = format!(
        "diff --git a/{file} b/{file}\n--- a/{file}\n+++ b/{file}\n@@ -{s},0 +{new_start},{new_count} @@\n",
        s = new_start.saturating_sub(1),
    );
    for i in 0..new_count {
        diff.push_str(&format!("+line {i}\n"));
    }
    diff
}

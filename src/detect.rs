/// Auto-detection of coverage report formats.
///
/// Strategy:
///   1. Check file extension for strong hints
///   2. Peek at the first bytes of the file content
///   3. Fall back to CLI --format override (handled by caller)
use std::path::Path;

/// Supported coverage report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// gcovr `--json` / `--json-summary` output.
    Json,
    Lcov,
    Cobertura,
    /// gcovr's default tabular text report.
    Text,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Lcov => "lcov",
            Format::Cobertura => "cobertura",
            Format::Text => "text",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the coverage format from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    // 1. Try extension-based detection
    if let Some(fmt) = detect_by_extension(path) {
        return Some(fmt);
    }

    // 2. Content-based detection
    detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "info" | "lcov" => Some(Format::Lcov),
        "json" => Some(Format::Json),
        _ => None, // .xml and .txt need content inspection
    }
}

fn detect_by_content(content: &[u8]) -> Option<Format> {
    // We only need to look at the first few KB
    let head_len = content.len().min(4096);
    let head = String::from_utf8_lossy(&content[..head_len]);
    let trimmed = head.trim_start();

    if trimmed.starts_with('{') {
        return Some(Format::Json);
    }

    // LCOV: lines start with TN:, SF:, DA:, etc.
    let has_sf = head.lines().any(|l| l.starts_with("SF:"));
    let has_da = head.lines().any(|l| l.starts_with("DA:"));
    if has_sf && has_da {
        return Some(Format::Lcov);
    }

    if (head.contains("<?xml") || trimmed.starts_with('<')) && head.contains("<coverage") {
        return Some(Format::Cobertura);
    }

    // gcovr text: a "File ... Cover" header row or a TOTAL row.
    let has_header = head.lines().any(|l| {
        let l = l.trim_start();
        l.starts_with("File") && l.contains("Cover")
    });
    if has_header || head.lines().any(|l| l.starts_with("TOTAL")) {
        return Some(Format::Text);
    }

    None
}

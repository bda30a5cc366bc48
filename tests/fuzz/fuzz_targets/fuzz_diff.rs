#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed headers are skipped, never fatal.
    if let Ok(s) = std::str::from_utf8(data) {
        let parsed = covgate::diff::parse_diff(s);
        for lines in parsed.files.values() {
            assert!(lines.windows(2).all(|w| w[0] < w[1]));
        }
    }
});

#![no_main]
use covgate::parsers::Parser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(parsed) = covgate::parsers::gcovr_text::GcovrTextParser.parse(data) {
        let _ = covgate::model::CoverageReport::from_data(parsed, None);
    }
});

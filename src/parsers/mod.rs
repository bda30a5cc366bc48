pub mod cobertura;
pub mod gcovr_json;
pub mod gcovr_text;
pub mod lcov;

use crate::detect::Format;
use crate::error::Result;
use crate::model::CoverageData;

/// Every format parser implements this trait.
pub trait Parser {
    /// Parse the input bytes into our uniform coverage model.
    fn parse(&self, input: &[u8]) -> Result<CoverageData>;
}

/// The parser for a given format.
pub fn parser_for(format: Format) -> &'static dyn Parser {
    match format {
        Format::Json => &gcovr_json::GcovrJsonParser,
        Format::Lcov => &lcov::LcovParser,
        Format::Cobertura => &cobertura::CoberturaParser,
        Format::Text => &gcovr_text::GcovrTextParser,
    }
}

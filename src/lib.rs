pub mod cli;
pub mod detect;
pub mod diff;
pub mod error;
pub mod gate;
pub mod ingest;
pub mod matcher;
pub mod model;
pub mod parsers;
pub mod report;

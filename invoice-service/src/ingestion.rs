//! Document ingestion: turning uploaded files into model input.

pub mod pdf;

//! Diagnostic output formats

pub mod json;
pub mod pretty;

//! Plain-text evaluation report written after the final fit.
pub mod report;

pub use report::EvaluationReport;

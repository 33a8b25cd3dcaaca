//! Data models for the FieldOps application.
//!
//! Field names serialize in camelCase, the shape clients already consume.

mod principal;
mod report;
mod student;

pub use principal::*;
pub use report::*;
pub use student::*;

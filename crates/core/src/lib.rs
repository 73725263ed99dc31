//! Pesantren core: the bulk import/export engine shared by the student,
//! teacher, and billing data-entry flows.
//!
//! This crate has no database or HTTP dependencies. Callers hand it bytes and
//! schemas; it hands back validated records or downloadable artifacts.

pub mod bulk;
pub mod error;

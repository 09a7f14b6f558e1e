//! # KeyFit Common Library
//!
//! Shared code for the KeyFit locksmith inventory system:
//! - Canonical transponder-compatibility records and database access
//! - Configuration loading and root folder resolution
//! - Common error types
//! - Vehicle year-range and chip-field primitives

pub mod config;
pub mod db;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ChipField, YearRange};

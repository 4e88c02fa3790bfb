//! # Verdant Common Library
//!
//! Shared code for Verdant services including:
//! - Error types and the common `Result` alias
//! - Bootstrap configuration loading (TOML + environment)
//! - Timestamp helpers used by persistence code

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};

//! # Huerto Common Library
//!
//! Shared code for the smart-garden services:
//! - Error taxonomy
//! - Configuration loading (TOML, environment, compiled defaults)
//! - Telemetry credential resolution
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};

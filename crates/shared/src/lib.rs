//! # VMS Shared
//!
//! Common types and interfaces used across all VMS crates.

pub mod config;
pub mod error;
pub mod logger;
pub mod types;

// Re-exports
pub use config::*;
pub use error::*;
pub use logger::*;
pub use types::*;

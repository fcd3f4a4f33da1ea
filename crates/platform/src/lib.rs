//! # VMS Platform
//!
//! The contract of the shared Platform that owns actors (people) and
//! entities (places) when a company federates its data.
//!
//! - `client` - The `PlatformClient` port
//! - `http` - reqwest implementation against the Platform REST API
//! - `in_memory` - Process-local Platform for development and tests

pub mod client;
pub mod error;
pub mod http;
pub mod in_memory;
pub mod types;

pub use client::PlatformClient;
pub use error::PlatformError;
pub use http::HttpPlatformClient;
pub use in_memory::InMemoryPlatform;
pub use types::*;

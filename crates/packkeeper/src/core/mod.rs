//! Core types used throughout the crate
//!
//! Errors, client configuration, the shared HTTP client and file helpers.
//! Every other module depends on these; they depend on nothing else here.

pub mod config;
pub mod error;
pub mod files;
pub mod http;

pub use config::{ClientConfig, CurseForgeConfig, ModrinthConfig};
pub use error::{FileOperation, PackError, Result};
pub use http::HttpClient;

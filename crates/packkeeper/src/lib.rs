//! Packkeeper Library
//!
//! Maintenance tooling for a Modrinth-format modpack repository: keeps the
//! pack index and the CurseForge override catalog in canonical form, drops
//! mods that cannot run on a given side, and keeps locally stored override
//! artifacts at their newest published version.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use packkeeper::{
//!     filter::{filter_index, FilterOutput},
//!     ClientConfig, HttpClient, ModrinthAPI, ModrinthConfig, Side,
//! };
//! use std::path::Path;
//!
//! # async fn example() -> packkeeper::Result<()> {
//! let http = HttpClient::from_config(&ClientConfig::default())?;
//! let modrinth = ModrinthAPI::new(&ModrinthConfig::default(), http)?;
//!
//! let report = filter_index(
//!     Path::new("modrinth.index.json"),
//!     Side::Server,
//!     &modrinth,
//!     &FilterOutput::InPlace { backup: true },
//! )
//! .await?;
//! println!("removed {} of {} files", report.removed.len(), report.total_files);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Canonical form**: deterministic ordering of files, keys and dependencies
//! - **Side filtering**: drops mods Modrinth marks unsupported on a side, keeps anything uncertain
//! - **Override reconciliation**: replaces stale override artifacts with the newest CurseForge file
//! - **Retry logic**: exponential backoff on transient lookup failures
//! - **Atomic writes**: files are replaced only once fully written

pub mod api;
pub mod core;
pub mod filter;
pub mod manifest;
pub mod reconcile;

// Re-export commonly used types for convenience
pub use api::{ArtifactCatalog, CurseForgeAPI, ModrinthAPI, ProjectSupport, SupportClassifier};
pub use crate::core::{
    ClientConfig, CurseForgeConfig, HttpClient, ModrinthConfig, PackError, Result,
};
pub use manifest::{CatalogEntry, CatalogId, Manifest, Side, SideSupport};

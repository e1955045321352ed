//! Clients for the external lookup services
//!
//! The filter and the reconciler only see the two traits below, so tests can
//! drive them with fixed fixtures instead of live services.

pub mod curseforge;
pub mod modrinth;

pub use curseforge::{CatalogFile, CurseForgeAPI};
pub use modrinth::{ModrinthAPI, ModrinthProject};

use async_trait::async_trait;

use crate::core::Result;
use crate::manifest::{CatalogId, Side, SideSupport};

/// Support verdict for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSupport {
    /// Display title, used in per-item output
    pub title: String,
    pub client_side: Option<SideSupport>,
    pub server_side: Option<SideSupport>,
}

impl ProjectSupport {
    pub fn support(&self, side: Side) -> Option<SideSupport> {
        match side {
            Side::Client => self.client_side,
            Side::Server => self.server_side,
        }
    }

    pub fn is_unsupported(&self, side: Side) -> bool {
        self.support(side) == Some(SideSupport::Unsupported)
    }
}

/// Answers "is this project usable on that side"
#[async_trait]
pub trait SupportClassifier: Send + Sync {
    /// `Ok(None)` when the service knows nothing about the project
    async fn classify(&self, project_id: &str) -> Result<Option<ProjectSupport>>;
}

/// Lists the published files of a catalog project, newest first
#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    async fn list_files(&self, id: &CatalogId) -> Result<Vec<CatalogFile>>;
}

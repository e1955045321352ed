//! Modrinth project lookups
//!
//! Only the project endpoint is used: it carries the display title and the
//! `client_side` / `server_side` support flags the filter needs.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ProjectSupport, SupportClassifier};
use crate::core::{HttpClient, ModrinthConfig, PackError, Result};
use crate::manifest::SideSupport;

/// Project as returned by `GET /v2/project/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthProject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub client_side: Option<SideSupport>,
    #[serde(default)]
    pub server_side: Option<SideSupport>,
}

impl ModrinthProject {
    /// Best available human name
    pub fn display_name(&self, fallback: &str) -> String {
        self.title
            .as_deref()
            .or(self.slug.as_deref())
            .or(self.id.as_deref())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Modrinth API client
#[derive(Debug, Clone)]
pub struct ModrinthAPI {
    base_url: Url,
    http: HttpClient,
}

impl ModrinthAPI {
    pub fn new(config: &ModrinthConfig, http: HttpClient) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| PackError::InvalidUrl {
            url: config.base_url.clone(),
            source: e,
        })?;
        Ok(Self { base_url, http })
    }

    fn project_url(&self, project_id: &str) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v2", "project", project_id]);
        }
        url.to_string()
    }

    /// Fetch a project, `None` if Modrinth does not know it
    pub async fn get_project(&self, project_id: &str) -> Result<Option<ModrinthProject>> {
        self.http.pace().await;
        let url = self.project_url(project_id);
        let project: Option<ModrinthProject> = self.http.get_json(&url, &[]).await?;
        debug!("Modrinth project {}: {:?}", project_id, project);
        Ok(project)
    }
}

#[async_trait]
impl SupportClassifier for ModrinthAPI {
    async fn classify(&self, project_id: &str) -> Result<Option<ProjectSupport>> {
        let project = self.get_project(project_id).await?;

        Ok(project
            .filter(|p| p.client_side.is_some() || p.server_side.is_some())
            .map(|p| ProjectSupport {
                title: p.display_name(project_id),
                client_side: p.client_side,
                server_side: p.server_side,
            }))
    }
}

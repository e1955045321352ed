//! CurseForge file listings
//!
//! Lists the files published for a mod, filtered by game version and loader
//! type, so the reconciler can tell the newest artifact from older ones.
//! Every page is fetched, so older files still count as history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::ArtifactCatalog;
use crate::core::{CurseForgeConfig, HttpClient, PackError, Result};
use crate::manifest::CatalogId;

/// One published file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Null when the author disabled third-party distribution
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_length: Option<u64>,
}

impl CatalogFile {
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref().filter(|n| !n.trim().is_empty())
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Largest page the files endpoint serves
pub const PAGE_SIZE: usize = 50;

/// The endpoint refuses `index + pageSize` beyond this
const MAX_RESULT_WINDOW: usize = 10_000;

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    data: Vec<CatalogFile>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    result_count: usize,
    #[serde(default)]
    total_count: usize,
}

impl Pagination {
    /// Index of the following page, `None` once everything was served
    fn next_index(&self) -> Option<usize> {
        let next = self.index + self.result_count;
        let more = self.result_count > 0 && next < self.total_count;
        (more && next + PAGE_SIZE <= MAX_RESULT_WINDOW).then_some(next)
    }
}

/// Order newest first; files without a date keep their order after dated ones
pub fn sort_newest_first(files: &mut [CatalogFile]) {
    files.sort_by(|a, b| match (&a.file_date, &b.file_date) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// CurseForge API client
#[derive(Clone)]
pub struct CurseForgeAPI {
    config: CurseForgeConfig,
    base_url: Url,
    http: HttpClient,
}

impl std::fmt::Debug for CurseForgeAPI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurseForgeAPI")
            .field("config", &self.config)
            .finish()
    }
}

impl CurseForgeAPI {
    pub fn new(config: CurseForgeConfig, http: HttpClient) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| PackError::InvalidUrl {
            url: config.base_url.clone(),
            source: e,
        })?;
        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    fn files_url(&self, id: &CatalogId, index: usize) -> String {
        let id = id.to_string();
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "mods", id.as_str(), "files"]);
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some(ref game_version) = self.config.game_version {
                query.append_pair("gameVersion", game_version);
            }
            if let Some(ref loader) = self.config.mod_loader_type {
                query.append_pair("modLoaderType", loader);
            }
            query.append_pair("index", &index.to_string());
            query.append_pair("pageSize", &PAGE_SIZE.to_string());
        }
        url.to_string()
    }

    /// Fetch one page; `None` when the service has no such page
    async fn files_page(
        &self,
        id: &CatalogId,
        index: usize,
    ) -> Result<Option<FileListResponse>> {
        self.http.pace().await;
        let url = self.files_url(id, index);
        let headers = [
            ("x-api-key", self.config.api_key.as_str()),
            ("Accept", "application/json"),
        ];
        self.http.get_json(&url, &headers).await
    }
}

#[async_trait]
impl ArtifactCatalog for CurseForgeAPI {
    async fn list_files(&self, id: &CatalogId) -> Result<Vec<CatalogFile>> {
        let first = self
            .files_page(id, 0)
            .await?
            .ok_or_else(|| PackError::EmptyResponse {
                url: self.files_url(id, 0),
            })?;

        let mut files = first.data;
        let mut next = first.pagination.as_ref().and_then(Pagination::next_index);
        while let Some(index) = next {
            debug!("CurseForge {}: fetching files from index {}", id, index);
            let Some(page) = self.files_page(id, index).await? else {
                break;
            };
            files.extend(page.data);
            next = page.pagination.as_ref().and_then(Pagination::next_index);
        }

        sort_newest_first(&mut files);
        debug!("CurseForge {} lists {} files", id, files.len());
        Ok(files)
    }
}

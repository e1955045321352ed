//! Override reconciliation
//!
//! For every catalog entry: list the project's published files, delete any
//! local file in the entry's directory that carries one of those names, then
//! download the newest one. Entries are processed one after another and
//! never affect each other; a failed entry is tallied and the run moves on.
//!
//! ```text
//! START -> QUERY_CATALOG -> (ok) VALIDATE -> (has download) CLEANUP -> DOWNLOAD -> DONE | FAILED
//!                        -> (error) SKIPPED
//!                                         -> (no download) SKIPPED
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::api::{ArtifactCatalog, CatalogFile};
use crate::core::{FileOperation, HttpClient, PackError, Result};
use crate::manifest::io::read_catalog;
use crate::manifest::{CatalogEntry, CatalogId};

/// Why an entry was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The catalog could not be queried
    QueryFailed(String),
    /// The newest file has no download location or no file name
    NoDownload,
    /// The newest file name would escape the target directory
    UnsafeFileName(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::QueryFailed(e) => write!(f, "catalog query failed: {}", e),
            SkipReason::NoDownload => write!(f, "newest file has no download"),
            SkipReason::UnsafeFileName(name) => write!(f, "refusing file name '{}'", name),
        }
    }
}

/// Terminal state of one catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Done {
        file_name: String,
        size: u64,
        deleted: Vec<String>,
    },
    Skipped(SkipReason),
    Failed {
        file_name: String,
        deleted: Vec<String>,
        error: String,
    },
}

impl EntryOutcome {
    pub fn deleted(&self) -> &[String] {
        match self {
            EntryOutcome::Done { deleted, .. } | EntryOutcome::Failed { deleted, .. } => {
                deleted.as_slice()
            }
            EntryOutcome::Skipped(_) => &[],
        }
    }
}

/// What the catalog says should be on disk for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub file_name: String,
    pub download_url: String,
    /// Every file name from the publication history, newest included
    pub historical: HashSet<String>,
}

/// A file name is usable only if it names a single entry inside the directory
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// VALIDATE: turn a newest-first file list into a plan, or a reason to skip
pub fn plan_entry(files: &[CatalogFile]) -> std::result::Result<Plan, SkipReason> {
    let newest = files.first().ok_or(SkipReason::NoDownload)?;
    let (Some(file_name), Some(download_url)) = (newest.file_name(), newest.download_url()) else {
        return Err(SkipReason::NoDownload);
    };
    if !is_safe_file_name(file_name) {
        return Err(SkipReason::UnsafeFileName(file_name.to_string()));
    }

    let historical = files
        .iter()
        .filter_map(CatalogFile::file_name)
        .filter(|name| {
            let safe = is_safe_file_name(name);
            if !safe {
                warn!("Ignoring unsafe historical file name '{}'", name);
            }
            safe
        })
        .map(str::to_string)
        .collect();

    Ok(Plan {
        file_name: file_name.to_string(),
        download_url: download_url.to_string(),
        historical,
    })
}

/// CLEANUP: delete files in `dir` whose names are in `historical`
///
/// Only regular files (or links) with an exact name match are touched. A
/// missing directory has nothing to clean.
pub async fn remove_historical(dir: &Path, historical: &HashSet<String>) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PackError::fs(dir, FileOperation::ListDir, e)),
    };

    let mut deleted = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PackError::fs(dir, FileOperation::ListDir, e))?
    {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !historical.contains(&name) {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| PackError::fs(entry.path(), FileOperation::ListDir, e))?;
        if file_type.is_dir() {
            debug!("{} matches a catalog file name but is a directory", entry.path().display());
            continue;
        }

        fs::remove_file(entry.path())
            .await
            .map_err(|e| PackError::fs(entry.path(), FileOperation::Delete, e))?;
        debug!("Deleted {}", entry.path().display());
        deleted.push(name);
    }

    deleted.sort();
    Ok(deleted)
}

/// Bring one entry's directory in line with the catalog
pub async fn reconcile_entry(
    entry: &CatalogEntry,
    root: &Path,
    catalog: &dyn ArtifactCatalog,
    http: &HttpClient,
) -> EntryOutcome {
    // QUERY_CATALOG
    let files = match catalog.list_files(&entry.id).await {
        Ok(files) => files,
        Err(e) => {
            error!("Catalog query for {} failed: {}", entry.id, e);
            return EntryOutcome::Skipped(SkipReason::QueryFailed(e.to_string()));
        }
    };

    // VALIDATE
    let plan = match plan_entry(&files) {
        Ok(plan) => plan,
        Err(reason) => {
            warn!("Skipping {} ({}): {}", entry.id, entry.path, reason);
            return EntryOutcome::Skipped(reason);
        }
    };

    // CLEANUP
    let dir = root.join(&entry.path);
    let deleted = match remove_historical(&dir, &plan.historical).await {
        Ok(deleted) => deleted,
        Err(e) => {
            error!("Cleanup of {} for {} failed: {}", dir.display(), entry.id, e);
            return EntryOutcome::Failed {
                file_name: plan.file_name,
                deleted: Vec::new(),
                error: e.to_string(),
            };
        }
    };
    for name in &deleted {
        info!("Deleted old {} from {}", name, entry.path);
    }

    // DOWNLOAD
    let dest = dir.join(&plan.file_name);
    match http.download_to_file(&plan.download_url, &dest).await {
        Ok(size) => {
            info!("Downloaded {} into {} ({} bytes)", plan.file_name, entry.path, size);
            EntryOutcome::Done {
                file_name: plan.file_name,
                size,
                deleted,
            }
        }
        Err(e) => {
            error!("Download of {} for {} failed: {}", plan.file_name, entry.id, e);
            EntryOutcome::Failed {
                file_name: plan.file_name,
                deleted,
                error: e.to_string(),
            }
        }
    }
}

/// Outcome of one catalog entry, in catalog order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub id: CatalogId,
    pub path: String,
    pub outcome: EntryOutcome,
}

/// Tally of a reconciliation run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub entries: Vec<EntryReport>,
}

impl ReconcileReport {
    pub fn done(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Done { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed { .. }))
    }

    pub fn deleted(&self) -> usize {
        self.entries.iter().map(|e| e.outcome.deleted().len()).sum()
    }

    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Reconcile every entry of an in-memory catalog list, in order
pub async fn reconcile_entries(
    entries: &[CatalogEntry],
    root: &Path,
    catalog: &dyn ArtifactCatalog,
    http: &HttpClient,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    for entry in entries {
        info!("Reconciling {} -> {}", entry.id, entry.path);
        let outcome = reconcile_entry(entry, root, catalog, http).await;
        report.entries.push(EntryReport {
            id: entry.id.clone(),
            path: entry.path.clone(),
            outcome,
        });
    }
    report
}

/// Reconcile the catalog list at `catalog_path`
///
/// Entry paths are resolved against `root`, or the catalog file's directory
/// when `root` is `None`. The catalog list itself is never rewritten.
pub async fn reconcile_catalog(
    catalog_path: &Path,
    root: Option<&Path>,
    catalog: &dyn ArtifactCatalog,
    http: &HttpClient,
) -> Result<ReconcileReport> {
    let entries = read_catalog(catalog_path)?;
    let root: PathBuf = match root {
        Some(root) => root.to_path_buf(),
        None => catalog_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    info!("Reconciling {} overrides under {}", entries.len(), root.display());

    let report = reconcile_entries(&entries, &root, catalog, http).await;
    info!(
        "Overrides: {} done, {} skipped, {} failed",
        report.done(),
        report.skipped(),
        report.failed()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClientConfig;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Catalog answering from a fixed table; unknown ids fail
    #[derive(Default)]
    struct FixtureCatalog {
        files: HashMap<CatalogId, Vec<CatalogFile>>,
    }

    impl FixtureCatalog {
        fn with(mut self, id: u64, files: Vec<CatalogFile>) -> Self {
            self.files.insert(CatalogId::from(id), files);
            self
        }
    }

    #[async_trait]
    impl ArtifactCatalog for FixtureCatalog {
        async fn list_files(&self, id: &CatalogId) -> Result<Vec<CatalogFile>> {
            self.files.get(id).cloned().ok_or(PackError::EmptyResponse {
                url: format!("fixture://{}", id),
            })
        }
    }

    fn file(name: &str, url: Option<String>) -> CatalogFile {
        CatalogFile {
            id: None,
            display_name: None,
            file_name: Some(name.to_string()),
            download_url: url,
            file_date: None,
            file_length: None,
        }
    }

    fn http() -> HttpClient {
        HttpClient::from_config(&ClientConfig::immediate()).unwrap()
    }

    async fn artifact_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/mod-2.0.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"v2".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/broken.jar"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        server
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_plan_uses_newest_and_collects_history() {
        let files = vec![
            file("mod-2.0.jar", Some("https://x/mod-2.0.jar".to_string())),
            file("mod-1.0.jar", Some("https://x/mod-1.0.jar".to_string())),
            file("../evil.jar", None),
        ];
        let plan = plan_entry(&files).unwrap();
        assert_eq!(plan.file_name, "mod-2.0.jar");
        assert_eq!(plan.download_url, "https://x/mod-2.0.jar");
        let mut history: Vec<_> = plan.historical.into_iter().collect();
        history.sort();
        assert_eq!(history, vec!["mod-1.0.jar", "mod-2.0.jar"]);
    }

    #[test]
    fn test_plan_rejects_missing_download() {
        assert_eq!(plan_entry(&[]), Err(SkipReason::NoDownload));
        assert_eq!(plan_entry(&[file("a.jar", None)]), Err(SkipReason::NoDownload));
        assert_eq!(
            plan_entry(&[file("a.jar", Some("  ".to_string()))]),
            Err(SkipReason::NoDownload)
        );
        assert_eq!(
            plan_entry(&[file("sub/a.jar", Some("https://x/a.jar".to_string()))]),
            Err(SkipReason::UnsafeFileName("sub/a.jar".to_string()))
        );
    }

    #[tokio::test]
    async fn test_replaces_old_version() {
        let server = artifact_server().await;
        let root = tempdir().unwrap();
        let mods = root.path().join("overrides/mods");
        std::fs::create_dir_all(&mods).unwrap();
        std::fs::write(mods.join("mod-1.0.jar"), b"v1").unwrap();
        std::fs::write(mods.join("unrelated.jar"), b"keep").unwrap();

        let catalog = FixtureCatalog::default().with(
            12345,
            vec![
                file("mod-2.0.jar", Some(format!("{}/files/mod-2.0.jar", server.uri()))),
                file("mod-1.0.jar", Some(format!("{}/files/mod-1.0.jar", server.uri()))),
            ],
        );
        let entry = CatalogEntry::new(12345, "overrides/mods");

        let outcome = reconcile_entry(&entry, root.path(), &catalog, &http()).await;
        assert_eq!(
            outcome,
            EntryOutcome::Done {
                file_name: "mod-2.0.jar".to_string(),
                size: 2,
                deleted: vec!["mod-1.0.jar".to_string()],
            }
        );
        assert_eq!(listing(&mods), vec!["mod-2.0.jar", "unrelated.jar"]);
        assert_eq!(std::fs::read(mods.join("mod-2.0.jar")).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_second_run_reaches_same_state() {
        let server = artifact_server().await;
        let root = tempdir().unwrap();
        let catalog = FixtureCatalog::default().with(
            1,
            vec![
                file("mod-2.0.jar", Some(format!("{}/files/mod-2.0.jar", server.uri()))),
                file("mod-1.0.jar", None),
            ],
        );
        let entries = vec![CatalogEntry::new(1, "overrides/mods")];
        let mods = root.path().join("overrides/mods");

        let first = reconcile_entries(&entries, root.path(), &catalog, &http()).await;
        assert_eq!(first.done(), 1);
        let after_first = listing(&mods);

        let second = reconcile_entries(&entries, root.path(), &catalog, &http()).await;
        assert_eq!(second.done(), 1);
        assert_eq!(second.entries[0].outcome.deleted(), ["mod-2.0.jar".to_string()]);
        assert_eq!(listing(&mods), after_first);
        assert_eq!(after_first, vec!["mod-2.0.jar"]);
    }

    #[tokio::test]
    async fn test_skips_and_failures_do_not_stop_the_run() {
        let server = artifact_server().await;
        let root = tempdir().unwrap();
        let shaders = root.path().join("overrides/shaderpacks");
        std::fs::create_dir_all(&shaders).unwrap();
        std::fs::write(shaders.join("pack-1.zip"), b"old").unwrap();

        let broken_url = format!("{}/files/broken.jar", server.uri());
        let mod_url = format!("{}/files/mod-2.0.jar", server.uri());
        let catalog = FixtureCatalog::default()
            .with(1, vec![file("pack-2.zip", None), file("pack-1.zip", None)])
            .with(2, vec![file("broken.jar", Some(broken_url))])
            .with(3, vec![file("mod-2.0.jar", Some(mod_url))]);
        let entries = vec![
            CatalogEntry::new(1, "overrides/shaderpacks"),
            CatalogEntry::new(2, "overrides/mods"),
            CatalogEntry::new(404, "overrides/mods"),
            CatalogEntry::new(3, "overrides/mods"),
        ];

        let report = reconcile_entries(&entries, root.path(), &catalog, &http()).await;
        assert_eq!(report.done(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 1);

        assert_eq!(report.entries[0].outcome, EntryOutcome::Skipped(SkipReason::NoDownload));
        assert!(matches!(
            report.entries[2].outcome,
            EntryOutcome::Skipped(SkipReason::QueryFailed(_))
        ));
        // Skipped entry: directory untouched
        assert_eq!(listing(&shaders), vec!["pack-1.zip"]);
        // Failed download leaves no partial file
        assert_eq!(listing(&root.path().join("overrides/mods")), vec!["mod-2.0.jar"]);
    }

    #[tokio::test]
    async fn test_cleanup_ignores_directories_and_other_names() {
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a.jar")).unwrap();
        std::fs::write(root.path().join("b.jar"), b"b").unwrap();
        std::fs::write(root.path().join("c.jar"), b"c").unwrap();

        let historical: HashSet<String> =
            ["a.jar", "b.jar"].iter().map(|s| s.to_string()).collect();
        let deleted = remove_historical(root.path(), &historical).await.unwrap();

        assert_eq!(deleted, vec!["b.jar"]);
        assert_eq!(listing(root.path()), vec!["a.jar", "c.jar"]);
        assert!(remove_historical(&root.path().join("missing"), &historical)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_catalog_resolves_against_catalog_dir() {
        let server = artifact_server().await;
        let root = tempdir().unwrap();
        let catalog_path = root.path().join("curseforge_overrides.json");
        let original = r#"[{"id": 7, "path": "overrides/mods"}]"#;
        std::fs::write(&catalog_path, original).unwrap();

        let catalog = FixtureCatalog::default().with(
            7,
            vec![file("mod-2.0.jar", Some(format!("{}/files/mod-2.0.jar", server.uri())))],
        );
        let report = reconcile_catalog(&catalog_path, None, &catalog, &http()).await.unwrap();

        assert_eq!(report.done(), 1);
        assert!(root.path().join("overrides/mods/mod-2.0.jar").exists());
        assert_eq!(std::fs::read_to_string(&catalog_path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_malformed_catalog_is_structural() {
        let root = tempdir().unwrap();
        let catalog_path = root.path().join("curseforge_overrides.json");
        std::fs::write(&catalog_path, r#"[{"path": "no id"}]"#).unwrap();

        let err = reconcile_catalog(&catalog_path, None, &FixtureCatalog::default(), &http())
            .await
            .unwrap_err();
        assert!(err.is_structural());
    }
}

//! Side support filter
//!
//! Asks the classification service about every project referenced by the
//! index and drops the entries it marks unsupported for the requested side.
//! Anything uncertain (no id in the URL, failed or empty lookup) is kept.
//!
//! Lookups run one at a time in file order. Each one goes through
//! [`lookup_project`], a pure `(id, classifier) -> Lookup` step, and the
//! verdicts are collected into a set before the index is touched, so lookup
//! order never changes the result.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::api::{ProjectSupport, SupportClassifier};
use crate::core::Result;
use crate::manifest::io::{backup_file, read_manifest, write_manifest};
use crate::manifest::{FileEntry, Manifest, Side};

/// Result of classifying one project id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Classified(ProjectSupport),
    /// Lookup failed or came back empty; the entry is kept
    Unavailable,
}

impl Lookup {
    pub fn is_unsupported(&self, side: Side) -> bool {
        match self {
            Lookup::Classified(support) => support.is_unsupported(side),
            Lookup::Unavailable => false,
        }
    }
}

/// Classify one project, folding every failure into `Lookup::Unavailable`
pub async fn lookup_project(project_id: &str, classifier: &dyn SupportClassifier) -> Lookup {
    match classifier.classify(project_id).await {
        Ok(Some(support)) => Lookup::Classified(support),
        Ok(None) => {
            warn!("No classification for {}, keeping it", project_id);
            Lookup::Unavailable
        }
        Err(e) => {
            warn!("Classification lookup for {} failed, keeping it: {}", project_id, e);
            Lookup::Unavailable
        }
    }
}

/// Verdicts for every distinct project id in an index
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Unsupported ids mapped to their display titles
    pub unsupported: HashMap<String, String>,
    /// Ids whose lookup failed, in file order
    pub unavailable: Vec<String>,
    /// Number of distinct ids looked up
    pub looked_up: usize,
}

impl Classification {
    pub fn unsupported_ids(&self) -> HashSet<&str> {
        self.unsupported.keys().map(String::as_str).collect()
    }
}

/// Look up every distinct project id once, in file order
pub async fn classify_entries(
    files: &[FileEntry],
    side: Side,
    classifier: &dyn SupportClassifier,
) -> Classification {
    let mut seen = HashSet::new();
    let mut classification = Classification::default();

    for entry in files {
        let Some(project_id) = entry.project_id() else {
            debug!("No project id in downloads of {}, never filtered", entry.path);
            continue;
        };
        if !seen.insert(project_id) {
            continue;
        }

        classification.looked_up += 1;
        match lookup_project(project_id, classifier).await {
            Lookup::Classified(support) if support.is_unsupported(side) => {
                classification
                    .unsupported
                    .insert(project_id.to_string(), support.title);
            }
            Lookup::Classified(_) => {}
            Lookup::Unavailable => classification.unavailable.push(project_id.to_string()),
        }
    }

    classification
}

/// An index entry dropped by the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntry {
    pub path: String,
    pub project_id: String,
    pub title: String,
}

/// Split `files` into kept and removed, preserving the order of kept entries
pub fn apply_verdicts(
    files: Vec<FileEntry>,
    classification: &Classification,
) -> (Vec<FileEntry>, Vec<RemovedEntry>) {
    let mut kept = Vec::with_capacity(files.len());
    let mut removed = Vec::new();

    for entry in files {
        let verdict = entry
            .project_id()
            .and_then(|id| classification.unsupported.get_key_value(id));
        match verdict {
            Some((id, title)) => removed.push(RemovedEntry {
                path: entry.path.clone(),
                project_id: id.clone(),
                title: title.clone(),
            }),
            None => kept.push(entry),
        }
    }

    (kept, removed)
}

/// Where the filtered index goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutput {
    /// Replace the index, optionally keeping a timestamped copy first
    InPlace { backup: bool },
    /// Write the filtered index to another file, leaving the original alone
    File(PathBuf),
    /// Report only
    DryRun,
}

/// Summary of one filter run
#[derive(Debug, Clone)]
pub struct FilterReport {
    pub side: Side,
    pub total_files: usize,
    pub removed: Vec<RemovedEntry>,
    /// Ids whose lookup failed; their entries were kept
    pub unavailable: Vec<String>,
    /// Entries with no extractable project id
    pub unextractable: usize,
    /// File written, if any
    pub written: Option<PathBuf>,
    pub backup: Option<PathBuf>,
}

impl FilterReport {
    pub fn kept(&self) -> usize {
        self.total_files - self.removed.len()
    }
}

/// Filter a manifest already in memory
pub async fn filter_manifest(
    mut manifest: Manifest,
    side: Side,
    classifier: &dyn SupportClassifier,
) -> (Manifest, Classification, Vec<RemovedEntry>) {
    let classification = classify_entries(&manifest.files, side, classifier).await;
    let files = std::mem::take(&mut manifest.files);
    let (kept, removed) = apply_verdicts(files, &classification);
    manifest.files = kept;
    (manifest, classification, removed)
}

/// Filter the index at `index_path` for `side`
///
/// The index is only written when at least one entry was removed, so a run
/// with nothing to do leaves the file byte-for-byte unchanged.
pub async fn filter_index(
    index_path: &Path,
    side: Side,
    classifier: &dyn SupportClassifier,
    output: &FilterOutput,
) -> Result<FilterReport> {
    let manifest = read_manifest(index_path)?;
    let total_files = manifest.files.len();
    let unextractable = manifest
        .files
        .iter()
        .filter(|f| f.project_id().is_none())
        .count();
    info!(
        "Checking {} files in {} for {} support",
        total_files,
        index_path.display(),
        side
    );

    let (filtered, classification, removed) = filter_manifest(manifest, side, classifier).await;
    for entry in &removed {
        info!("Removing {} ({}) from {}", entry.project_id, entry.title, entry.path);
    }

    let mut report = FilterReport {
        side,
        total_files,
        removed,
        unavailable: classification.unavailable,
        unextractable,
        written: None,
        backup: None,
    };

    if report.removed.is_empty() {
        info!("Nothing unsupported on {}, index left untouched", side);
        return Ok(report);
    }

    match output {
        FilterOutput::DryRun => {}
        FilterOutput::InPlace { backup } => {
            if *backup {
                report.backup = Some(backup_file(index_path)?);
            }
            write_manifest(index_path, &filtered)?;
            report.written = Some(index_path.to_path_buf());
        }
        FilterOutput::File(path) => {
            write_manifest(path, &filtered)?;
            report.written = Some(path.clone());
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PackError;
    use crate::manifest::SideSupport;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Classifier answering from a fixed table and recording every call
    #[derive(Default)]
    struct FixtureClassifier {
        verdicts: HashMap<String, (SideSupport, SideSupport)>,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FixtureClassifier {
        fn with(mut self, id: &str, client: SideSupport, server: SideSupport) -> Self {
            self.verdicts.insert(id.to_string(), (client, server));
            self
        }

        fn failing(mut self, id: &str) -> Self {
            self.failing.insert(id.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SupportClassifier for FixtureClassifier {
        async fn classify(&self, project_id: &str) -> Result<Option<ProjectSupport>> {
            self.calls.lock().unwrap().push(project_id.to_string());
            if self.failing.contains(project_id) {
                return Err(PackError::EmptyResponse {
                    url: format!("fixture://{}", project_id),
                });
            }
            Ok(self.verdicts.get(project_id).map(|(client, server)| ProjectSupport {
                title: format!("Title {}", project_id),
                client_side: Some(*client),
                server_side: Some(*server),
            }))
        }
    }

    fn entry(path: &str, id: &str) -> FileEntry {
        FileEntry::new(path).with_download(format!(
            "https://cdn.modrinth.com/data/{}/versions/v1/{}",
            id, path
        ))
    }

    fn manifest(files: Vec<FileEntry>) -> Manifest {
        Manifest {
            game: Some("minecraft".into()),
            files,
            ..Manifest::default()
        }
    }

    fn paths(files: &[FileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    use SideSupport::{Optional, Required, Unsupported};

    #[tokio::test]
    async fn test_removes_only_unsupported_for_side() {
        let classifier = FixtureClassifier::default()
            .with("XYZ1", Required, Unsupported)
            .with("ABC2", Unsupported, Required)
            .with("DEF3", Optional, Optional);
        let input = manifest(vec![
            entry("mods/shader.jar", "XYZ1"),
            entry("mods/server.jar", "ABC2"),
            entry("mods/lib.jar", "DEF3"),
        ]);

        let (server, _, removed) = filter_manifest(input.clone(), Side::Server, &classifier).await;
        assert_eq!(paths(&server.files), vec!["mods/server.jar", "mods/lib.jar"]);
        assert_eq!(
            removed,
            vec![RemovedEntry {
                path: "mods/shader.jar".to_string(),
                project_id: "XYZ1".to_string(),
                title: "Title XYZ1".to_string(),
            }]
        );

        let (client, _, _) = filter_manifest(input, Side::Client, &classifier).await;
        assert_eq!(paths(&client.files), vec!["mods/shader.jar", "mods/lib.jar"]);
    }

    #[tokio::test]
    async fn test_uncertain_entries_are_kept() {
        let classifier = FixtureClassifier::default().failing("BAD1");
        let mut no_downloads = FileEntry::new("config/options.txt");
        no_downloads.file_size = Some(3);
        let input = manifest(vec![
            entry("mods/a.jar", "BAD1"),
            entry("mods/b.jar", "UNKNOWN"),
            no_downloads,
            FileEntry::new("mods/c.jar").with_download("https://example.com/c.jar"),
        ]);

        let (output, classification, removed) =
            filter_manifest(input.clone(), Side::Server, &classifier).await;
        assert!(removed.is_empty());
        assert_eq!(output, input);
        assert_eq!(classification.unavailable, vec!["BAD1", "UNKNOWN"]);
        assert_eq!(classifier.calls(), vec!["BAD1", "UNKNOWN"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_classified_once() {
        let classifier = FixtureClassifier::default().with("XYZ1", Required, Unsupported);
        let input = manifest(vec![
            entry("mods/a.jar", "XYZ1"),
            entry("mods/keep.jar", "KEEP"),
            entry("mods/b.jar", "XYZ1"),
        ]);

        let (output, classification, removed) =
            filter_manifest(input, Side::Server, &classifier).await;
        assert_eq!(classifier.calls(), vec!["XYZ1", "KEEP"]);
        assert_eq!(classification.looked_up, 2);
        assert_eq!(removed.len(), 2);
        assert_eq!(paths(&output.files), vec!["mods/keep.jar"]);
    }

    #[tokio::test]
    async fn test_filter_index_writes_when_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modrinth.index.json");
        let input = manifest(vec![entry("mods/a.jar", "XYZ1"), entry("mods/b.jar", "KEEP")]);
        write_manifest(&path, &input).unwrap();

        let classifier = FixtureClassifier::default().with("XYZ1", Required, Unsupported);
        let in_place = FilterOutput::InPlace { backup: true };
        let report = filter_index(&path, Side::Server, &classifier, &in_place)
            .await
            .unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.kept(), 1);
        assert_eq!(report.written.as_deref(), Some(path.as_path()));
        let backup = report.backup.unwrap();
        assert_eq!(read_manifest(&backup).unwrap(), input);

        let on_disk = read_manifest(&path).unwrap();
        assert_eq!(paths(&on_disk.files), vec!["mods/b.jar"]);
        assert_eq!(on_disk.game(), Some("minecraft"));
    }

    #[tokio::test]
    async fn test_filter_index_no_removals_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modrinth.index.json");
        // Deliberately non-canonical formatting: a rewrite would change the bytes.
        let original = r#"{"files":[{"downloads":["https://cdn.modrinth.com/data/KEEP/versions/1/a.jar"],"path":"mods/a.jar"}],"game":"minecraft"}"#;
        std::fs::write(&path, original).unwrap();

        let classifier = FixtureClassifier::default().with("KEEP", Required, Required);
        let in_place = FilterOutput::InPlace { backup: true };
        let report = filter_index(&path, Side::Server, &classifier, &in_place)
            .await
            .unwrap();

        assert!(report.removed.is_empty());
        assert!(report.written.is_none());
        assert!(report.backup.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_and_output_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modrinth.index.json");
        let out = dir.path().join("server.index.json");
        let input = manifest(vec![entry("mods/a.jar", "XYZ1")]);
        write_manifest(&path, &input).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let classifier = FixtureClassifier::default().with("XYZ1", Required, Unsupported);
        let dry = filter_index(&path, Side::Server, &classifier, &FilterOutput::DryRun)
            .await
            .unwrap();
        assert_eq!(dry.removed.len(), 1);
        assert!(dry.written.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        let to_file = FilterOutput::File(out.clone());
        let copied = filter_index(&path, Side::Server, &classifier, &to_file)
            .await
            .unwrap();
        assert_eq!(copied.written.as_deref(), Some(out.as_path()));
        assert!(read_manifest(&out).unwrap().files.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_index_is_structural() {
        let dir = tempdir().unwrap();
        let classifier = FixtureClassifier::default();
        let err = filter_index(
            &dir.path().join("missing.json"),
            Side::Client,
            &classifier,
            &FilterOutput::InPlace { backup: false },
        )
        .await
        .unwrap_err();
        assert!(err.is_structural());
        assert!(classifier.calls().is_empty());
    }
}

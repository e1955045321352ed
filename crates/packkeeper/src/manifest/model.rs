//! Pack index data model
//!
//! Known fields are typed; every other key is kept in a flattened map so it
//! survives a read/write cycle untouched. Field declaration order is the
//! canonical output order, unknown keys follow the known ones.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Insertion-ordered JSON object (serde_json is built with `preserve_order`)
pub type JsonMap = serde_json::Map<String, Value>;

/// Slash-delimited segment of a download URL holding the catalog project id
///
/// Download URLs look like `https://cdn.modrinth.com/data/<id>/versions/<version>/<file>`,
/// so splitting on `/` puts the id at index 4.
pub const PROJECT_ID_SEGMENT: usize = 4;

/// Runtime side an artifact applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            other => Err(format!("invalid side '{}', expected 'client' or 'server'", other)),
        }
    }
}

/// Support level of an artifact on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideSupport {
    Required,
    Optional,
    Unsupported,
    /// Reported by the classification service when the author never said
    Unknown,
}

/// The pack index (`modrinth.index.json`)
///
/// The descriptive top-level fields are kept as raw JSON values: a key that
/// is present stays present, explicit `null` included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub game: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub format_version: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub version_id: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Outer `None`: key absent. `Some(None)`: explicit `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Option<Dependencies>>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Manifest {
    pub fn game(&self) -> Option<&str> {
        self.game.as_ref().and_then(Value::as_str)
    }

    pub fn format_version(&self) -> Option<u64> {
        self.format_version.as_ref().and_then(Value::as_u64)
    }

    pub fn dependencies(&self) -> Option<&Dependencies> {
        self.dependencies.as_ref().and_then(Option::as_ref)
    }
}

/// Any key that appears in the input deserializes to `Some`, even `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// One artifact tracked by the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Hashes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Vec<String>>,
    #[serde(rename = "fileSize", default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl FileEntry {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_download<S: Into<String>>(mut self, url: S) -> Self {
        self.downloads.get_or_insert_with(Vec::new).push(url.into());
        self
    }

    /// Catalog project id governing this entry, taken from its first download URL
    ///
    /// Returns `None` when there is no download or the URL is too short to
    /// carry an id; such entries are never filtered.
    pub fn project_id(&self) -> Option<&str> {
        let url = self.downloads.as_ref()?.first()?;
        url.split('/')
            .nth(PROJECT_ID_SEGMENT)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
    }
}

/// Integrity hashes of an artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hashes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Per-side support flags of an artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<SideSupport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<SideSupport>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl EnvFlags {
    pub fn get(&self, side: Side) -> Option<SideSupport> {
        match side {
            Side::Client => self.client,
            Side::Server => self.server,
        }
    }
}

/// Runtime dependencies of the pack: loader/game name to version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dependencies(pub JsonMap);

impl Dependencies {
    /// Keys that lead the canonical ordering, in this order
    pub const LEADING_KEYS: [&'static str; 2] = ["neoforge", "minecraft"];

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

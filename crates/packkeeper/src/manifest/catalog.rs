//! Override catalog list (`curseforge_overrides.json`)
//!
//! Each entry names an external catalog project and the directory its newest
//! published file must live in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use super::model::JsonMap;

/// Catalog project identifier, stored as it appeared in the file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogId {
    Number(u64),
    Text(String),
}

impl CatalogId {
    pub fn to_value(&self) -> Value {
        match self {
            CatalogId::Number(n) => Value::from(*n),
            CatalogId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogId::Number(n) => write!(f, "{}", n),
            CatalogId::Text(s) => f.write_str(s),
        }
    }
}

// Numbers sort numerically ahead of strings, strings sort lexicographically.
impl Ord for CatalogId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CatalogId::Number(a), CatalogId::Number(b)) => a.cmp(b),
            (CatalogId::Number(_), CatalogId::Text(_)) => Ordering::Less,
            (CatalogId::Text(_), CatalogId::Number(_)) => Ordering::Greater,
            (CatalogId::Text(a), CatalogId::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for CatalogId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for CatalogId {
    fn from(id: u64) -> Self {
        CatalogId::Number(id)
    }
}

impl From<&str> for CatalogId {
    fn from(id: &str) -> Self {
        CatalogId::Text(id.to_string())
    }
}

/// One tracked override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CatalogId,
    /// Directory, relative to the pack root, that holds the artifact
    pub path: String,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl CatalogEntry {
    pub fn new<I: Into<CatalogId>, P: Into<String>>(id: I, path: P) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            extra: JsonMap::new(),
        }
    }

    /// JSON object with keys in alphabetical order
    pub fn to_sorted_value(&self) -> Value {
        let mut pairs: Vec<(String, Value)> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.push(("id".to_string(), self.id.to_value()));
        pairs.push(("path".to_string(), Value::String(self.path.clone())));
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        Value::Object(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_keep_their_json_type() {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(r#"[{"id":12345,"path":"a"},{"id":"abc","path":"b"}]"#).unwrap();
        assert_eq!(entries[0].id, CatalogId::Number(12345));
        assert_eq!(entries[1].id, CatalogId::Text("abc".to_string()));
        assert_eq!(entries[0].id.to_string(), "12345");
    }

    #[test]
    fn test_id_ordering() {
        let mut ids = vec![
            CatalogId::from("b"),
            CatalogId::from(20),
            CatalogId::from("a"),
            CatalogId::from(3),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                CatalogId::from(3),
                CatalogId::from(20),
                CatalogId::from("a"),
                CatalogId::from("b"),
            ]
        );
    }

    #[test]
    fn test_sorted_value_orders_keys() {
        let raw = r#"{"path":"overrides/mods","note":"x","id":1,"enabled":true}"#;
        let entry: CatalogEntry = serde_json::from_str(raw).unwrap();
        let value = entry.to_sorted_value();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["enabled", "id", "note", "path"]);
    }
}

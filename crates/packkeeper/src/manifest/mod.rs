//! Pack index and override catalog list
//!
//! The on-disk shape of both files, their canonical form, and atomic
//! read/write helpers.

pub mod canonical;
pub mod catalog;
pub mod io;
pub mod model;

pub use canonical::{
    CanonicalReport, CanonicalStatus, canonicalize, canonicalize_catalog, canonicalize_files,
};
pub use catalog::{CatalogEntry, CatalogId};
pub use io::{DEFAULT_CATALOG_FILE, DEFAULT_INDEX_FILE};
pub use model::{
    Dependencies, EnvFlags, FileEntry, Hashes, JsonMap, Manifest, PROJECT_ID_SEGMENT, Side,
    SideSupport,
};

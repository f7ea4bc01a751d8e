//! Per-file artifacts: naming, sidecar metadata and atomic writes

pub mod metadata;
pub mod naming;

pub use metadata::{MetadataRecord, MetadataStatus, MetadataStore};
pub use naming::{ArtifactNames, Naming};

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path` via a temporary file in the same directory
///
/// The temporary file is synced before the rename, so `path` either keeps
/// its previous contents or holds all of `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

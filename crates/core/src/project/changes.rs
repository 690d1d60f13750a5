//! Content-hash based change detection between two invocations.

use crate::config::pair_key;
use crate::error::{AbiscopeError, Result};
use crate::model::SourceFileState;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

const CLASSPATH_HASH_FILE: &str = "classpath_hash.bin";
const SOURCES_HASH_FILE: &str = "sources_hash.bin";

/// Compares classpath and source digests against the ones saved after the last
/// successful compilation of the same (source root, output root) pair.
///
/// Digests computed by [`Self::is_classpath_changed`] and [`Self::source_status`] are
/// only written by [`Self::save_state`].
pub struct FileSystemChangesDetector {
    root: PathBuf,
    classpath_digest: Option<u64>,
    source_digests: Option<BTreeMap<String, u64>>,
}

impl FileSystemChangesDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            classpath_digest: None,
            source_digests: None,
        }
    }

    fn state_dir(&self, source_root: &Path, output_root: &Path) -> PathBuf {
        self.root.join(pair_key(source_root, output_root))
    }

    pub fn is_classpath_changed(
        &mut self,
        source_root: &Path,
        output_root: &Path,
        classpath: &[PathBuf],
    ) -> Result<bool> {
        let digest = classpath_digest(classpath)?;
        let previous: Option<u64> =
            read_state(&self.state_dir(source_root, output_root).join(CLASSPATH_HASH_FILE));
        self.classpath_digest = Some(digest);

        let changed = previous != Some(digest);
        tracing::debug!("Classpath digest {:016x}, changed: {}", digest, changed);
        Ok(changed)
    }

    /// State of every file under `source_root` with the given extension, plus the files
    /// that were present last time and are gone now.
    pub fn source_status(
        &mut self,
        source_root: &Path,
        output_root: &Path,
        extension: &str,
    ) -> Result<BTreeMap<PathBuf, SourceFileState>> {
        let current = source_digests(source_root, extension)?;
        let previous: BTreeMap<String, u64> =
            read_state(&self.state_dir(source_root, output_root).join(SOURCES_HASH_FILE))
                .unwrap_or_default();

        let mut status = BTreeMap::new();
        for (path, digest) in &current {
            let state = match previous.get(path) {
                None => SourceFileState::Added,
                Some(old) if old != digest => SourceFileState::Changed,
                Some(_) => SourceFileState::NotChanged,
            };
            status.insert(PathBuf::from(path), state);
        }
        for path in previous.keys() {
            if !current.contains_key(path) {
                status.insert(PathBuf::from(path), SourceFileState::Removed);
            }
        }

        self.source_digests = Some(current);
        Ok(status)
    }

    /// Persists the digests computed during this run.
    pub fn save_state(&self, source_root: &Path, output_root: &Path) -> Result<()> {
        let dir = self.state_dir(source_root, output_root);
        std::fs::create_dir_all(&dir)?;

        if let Some(digest) = &self.classpath_digest {
            write_state(&dir.join(CLASSPATH_HASH_FILE), digest)?;
        }
        if let Some(digests) = &self.source_digests {
            write_state(&dir.join(SOURCES_HASH_FILE), digests)?;
        }
        Ok(())
    }

    /// Forgets the saved digests, so the next run sees every file as changed.
    pub fn clear_cache(&self, source_root: &Path, output_root: &Path) -> Result<()> {
        let dir = self.state_dir(source_root, output_root);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn classpath_digest(classpath: &[PathBuf]) -> Result<u64> {
    let mut hasher = Xxh3::new();
    for entry in classpath {
        hasher.update(entry.to_string_lossy().as_bytes());
        if entry.is_dir() {
            for file in WalkDir::new(entry).sort_by_file_name() {
                let file = file.map_err(std::io::Error::from)?;
                if file.file_type().is_file() {
                    hasher.update(file.path().to_string_lossy().as_bytes());
                    hasher.update(&std::fs::read(file.path())?);
                }
            }
        } else if entry.is_file() {
            hasher.update(&std::fs::read(entry)?);
        } else {
            tracing::debug!("Classpath entry {} does not exist", entry.display());
        }
    }
    Ok(hasher.digest())
}

fn source_digests(source_root: &Path, extension: &str) -> Result<BTreeMap<String, u64>> {
    let mut digests = BTreeMap::new();
    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != extension) {
            continue;
        }
        let content = std::fs::read(path)?;
        digests.insert(path.to_string_lossy().into_owned(), xxh3_64(&content));
    }
    Ok(digests)
}

fn read_state<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = std::fs::read(path).ok()?;
    match rmp_serde::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable digest file {}: {}", path.display(), e);
            None
        }
    }
}

fn write_state<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = rmp_serde::to_vec(value)
        .map_err(|e| AbiscopeError::Internal(format!("MSGPACK error: {}", e)))?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

//! Locations of the on-disk state shared between invocations.

use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Overrides the cache root, mostly useful for tests and CI sandboxes.
pub const CACHE_DIR_ENV: &str = "ABISCOPE_CACHE_DIR";

const BASE_DIR_NAME: &str = ".abiscope";

/// `~/.abiscope`, falling back to the working directory when no home is known.
pub fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(BASE_DIR_NAME)
}

/// Key shared by every cache belonging to one (source root, output root) pair.
pub fn pair_key(source_root: &Path, output_root: &Path) -> String {
    let key = format!(
        "{}{}",
        absolute(source_root).display(),
        absolute(output_root).display()
    );
    format!("{:016x}", xxh3_64(key.as_bytes()))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Honors `ABISCOPE_CACHE_DIR`, otherwise `~/.abiscope/caches`.
    pub fn from_env() -> Self {
        match std::env::var_os(CACHE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new(base_dir().join("caches")),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the change detector digests.
    pub fn filesystem_dir(&self) -> PathBuf {
        self.root.join("filesystem")
    }

    /// Solver cache file for the given pair.
    pub fn incremental_cache_file(&self, source_root: &Path, output_root: &Path) -> PathBuf {
        self.root
            .join("incremental")
            .join(format!("{}.bin", pair_key(source_root, output_root)))
    }
}

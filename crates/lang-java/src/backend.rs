use abiscope_core::error::{AbiscopeError, Result};
use abiscope_core::plugin::CompilerBackend;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Runs `javac` as a child process with inherited stdout and stderr.
///
/// Precompiled classes are copied into a temporary directory appended to the classpath, so
/// the compiler resolves them without recompiling their sources. There is no timeout.
pub struct JavacBackend {
    javac: PathBuf,
}

impl JavacBackend {
    pub fn new(javac: impl Into<PathBuf>) -> Self {
        Self {
            javac: javac.into(),
        }
    }

    /// Uses the `javac` found via `JAVA_HOME` or `PATH`.
    pub fn discover() -> Self {
        Self::new(crate::jdk::find_javac())
    }

    pub fn javac(&self) -> &Path {
        &self.javac
    }
}

/// Copies `precompiled` (files under `output_dir`) into a fresh temporary directory,
/// keeping their layout relative to `output_dir`.
pub fn materialize_overlay(output_dir: &Path, precompiled: &BTreeSet<PathBuf>) -> Result<TempDir> {
    let overlay = tempfile::Builder::new()
        .prefix("abiscope-overlay")
        .tempdir()?;

    for file in precompiled {
        let Ok(relative) = file.strip_prefix(output_dir) else {
            tracing::warn!(
                "Precompiled file {} is outside {}",
                file.display(),
                output_dir.display()
            );
            continue;
        };
        let target = overlay.path().join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(file, &target)?;
    }
    Ok(overlay)
}

impl CompilerBackend for JavacBackend {
    fn compile(
        &self,
        output_dir: &Path,
        classpath: &BTreeSet<PathBuf>,
        precompiled: &BTreeSet<PathBuf>,
        sources: &BTreeSet<PathBuf>,
    ) -> Result<i32> {
        std::fs::create_dir_all(output_dir)?;

        // Dropped (and deleted) once javac has exited.
        let overlay = if precompiled.is_empty() {
            None
        } else {
            Some(materialize_overlay(output_dir, precompiled)?)
        };

        let mut entries: Vec<&Path> = classpath.iter().map(PathBuf::as_path).collect();
        if let Some(overlay) = &overlay {
            entries.push(overlay.path());
        }

        let mut command = Command::new(&self.javac);
        if !entries.is_empty() {
            let joined = std::env::join_paths(&entries)
                .map_err(|e| AbiscopeError::Backend(format!("invalid classpath: {}", e)))?;
            command.arg("-cp").arg(joined);
        }
        command.arg("-d").arg(output_dir).args(sources);

        tracing::debug!(
            "Running {} on {} sources ({} precompiled classes)",
            self.javac.display(),
            sources.len(),
            precompiled.len()
        );
        let status = command.status().map_err(|e| {
            AbiscopeError::Backend(format!("failed to run {}: {}", self.javac.display(), e))
        })?;

        Ok(status.code().unwrap_or(1))
    }
}

use abiscope_core::config::CacheLayout;
use abiscope_core::error::Result;
use abiscope_core::project::FileSystemChangesDetector;
use abiscope_core::{CompileReport, Compiler, SourceFileState, Toolchain};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub fn run(sources: &Path, classpath: &[PathBuf], output: Option<&Path>) -> Result<i32> {
    let (source_root, output_root) = crate::resolve_roots(sources, output)?;
    info!(
        "Compiling {} into {}",
        source_root.display(),
        output_root.display()
    );
    compile_with(
        &CacheLayout::from_env(),
        abiscope_java::java_toolchain(),
        &source_root,
        &output_root,
        classpath,
    )
}

/// One driver invocation: detect changes, compile, then commit or drop the change
/// detector state depending on the backend exit code.
pub(crate) fn compile_with(
    layout: &CacheLayout,
    toolchain: Toolchain,
    source_root: &Path,
    output_root: &Path,
    classpath: &[PathBuf],
) -> Result<i32> {
    let mut detector = FileSystemChangesDetector::new(layout.filesystem_dir());
    let status = detector.source_status(source_root, output_root, &toolchain.source_extension)?;
    if status.values().all(|state| *state == SourceFileState::Removed) {
        error!("No sources found in {}", source_root.display());
        return Ok(1);
    }

    let classpath_changed = detector.is_classpath_changed(source_root, output_root, classpath)?;
    let classpath_set: BTreeSet<PathBuf> = classpath.iter().cloned().collect();
    let cache_file = layout.incremental_cache_file(source_root, output_root);
    let compiler = Compiler::new(toolchain);

    let report = match compiler.compile_sources(
        &classpath_set,
        classpath_changed,
        output_root,
        &cache_file,
        &status,
    ) {
        Err(e) if e.requires_full_rebuild() => {
            warn!("{}, recompiling everything", e);
            detector.clear_cache(source_root, output_root)?;
            compiler.compile_sources(&classpath_set, true, output_root, &cache_file, &status)?
        }
        other => other?,
    };

    finish(&detector, source_root, output_root, &report)?;
    Ok(report.exit_code)
}

fn finish(
    detector: &FileSystemChangesDetector,
    source_root: &Path,
    output_root: &Path,
    report: &CompileReport,
) -> Result<()> {
    if report.is_success() {
        detector.save_state(source_root, output_root)?;
        info!(
            "{:?}: {} sources compiled",
            report.mode,
            report.recompiled.len()
        );
    } else {
        detector.clear_cache(source_root, output_root)?;
        error!("javac exited with {}", report.exit_code);
    }
    Ok(())
}

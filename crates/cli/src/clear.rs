use abiscope_core::IncrementalCompilationSolver;
use abiscope_core::config::CacheLayout;
use abiscope_core::error::Result;
use abiscope_core::project::FileSystemChangesDetector;
use std::path::Path;
use tracing::info;

pub fn run(sources: &Path, output: Option<&Path>) -> Result<()> {
    let (source_root, output_root) = crate::resolve_roots(sources, output)?;
    let layout = CacheLayout::from_env();

    FileSystemChangesDetector::new(layout.filesystem_dir()).clear_cache(&source_root, &output_root)?;
    let cache_file = layout.incremental_cache_file(&source_root, &output_root);
    IncrementalCompilationSolver::open(cache_file, &abiscope_java::java_toolchain()).reset()?;

    info!("Cleared caches of {}", source_root.display());
    Ok(())
}

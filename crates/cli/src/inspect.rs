use abiscope_core::IncrementalCompilationSolver;
use abiscope_core::config::CacheLayout;
use abiscope_core::error::{AbiscopeError, Result};
use std::path::Path;

pub fn run(sources: &Path, output: Option<&Path>) -> Result<()> {
    let (source_root, output_root) = crate::resolve_roots(sources, output)?;
    let cache_file = CacheLayout::from_env().incremental_cache_file(&source_root, &output_root);
    let solver = IncrementalCompilationSolver::open(cache_file, &abiscope_java::java_toolchain());

    let json = serde_json::to_string_pretty(&solver.snapshot())
        .map_err(|e| AbiscopeError::Internal(e.to_string()))?;
    println!("{json}");
    Ok(())
}

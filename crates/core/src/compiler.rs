//! Full versus incremental recompilation decisions.

use crate::engine::IncrementalCompilationSolver;
use crate::error::Result;
use crate::model::SourceFileState;
use crate::plugin::Toolchain;
use crate::util;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompilationMode {
    FullRecompile,
    NoOpChanged,
    Incremental,
}

/// Outcome of one [`Compiler::compile_sources`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    pub mode: CompilationMode,
    /// Backend exit code, `0` when the backend was not needed
    pub exit_code: i32,
    pub recompiled: BTreeSet<PathBuf>,
}

impl CompileReport {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct Compiler {
    toolchain: Toolchain,
}

impl Compiler {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Compiles what `sources` requires and, on success, commits the new ABI state to
    /// `cache_file`. A failing backend leaves the cached state untouched.
    pub fn compile_sources(
        &self,
        classpath: &BTreeSet<PathBuf>,
        classpath_changed: bool,
        output_dir: &Path,
        cache_file: &Path,
        sources: &BTreeMap<PathBuf, SourceFileState>,
    ) -> Result<CompileReport> {
        let mut solver = IncrementalCompilationSolver::open(cache_file, &self.toolchain);

        if classpath_changed {
            return self.full_recompile(&mut solver, classpath, output_dir, sources);
        }

        // Without a graph, dependents of previously compiled sources are unknown.
        if solver.is_cold()
            && sources
                .values()
                .any(|state| *state != SourceFileState::Added)
        {
            tracing::warn!(
                "No usable incremental cache at {}, recompiling everything",
                cache_file.display()
            );
            return self.full_recompile(&mut solver, classpath, output_dir, sources);
        }

        if sources
            .values()
            .all(|state| *state == SourceFileState::NotChanged)
        {
            tracing::info!("No source changes, nothing to compile");
            return Ok(CompileReport {
                mode: CompilationMode::NoOpChanged,
                exit_code: 0,
                recompiled: BTreeSet::new(),
            });
        }

        self.incremental_recompile(&mut solver, classpath, output_dir, sources)
    }

    fn full_recompile(
        &self,
        solver: &mut IncrementalCompilationSolver,
        classpath: &BTreeSet<PathBuf>,
        output_dir: &Path,
        sources: &BTreeMap<PathBuf, SourceFileState>,
    ) -> Result<CompileReport> {
        let present: BTreeSet<PathBuf> = sources
            .iter()
            .filter(|(_, state)| **state != SourceFileState::Removed)
            .map(|(path, _)| path.clone())
            .collect();
        tracing::info!("Full recompilation of {} sources", present.len());

        util::recreate_dir(output_dir)?;
        let exit_code = if present.is_empty() {
            0
        } else {
            self.toolchain
                .backend
                .compile(output_dir, classpath, &BTreeSet::new(), &present)?
        };

        if exit_code == 0 {
            solver.reset()?;
            solver.refresh_abi(output_dir, &present)?;
            solver.persist()?;
        } else {
            tracing::warn!("Compiler exited with {}, keeping previous state", exit_code);
        }

        Ok(CompileReport {
            mode: CompilationMode::FullRecompile,
            exit_code,
            recompiled: present,
        })
    }

    fn incremental_recompile(
        &self,
        solver: &mut IncrementalCompilationSolver,
        classpath: &BTreeSet<PathBuf>,
        output_dir: &Path,
        sources: &BTreeMap<PathBuf, SourceFileState>,
    ) -> Result<CompileReport> {
        let mut recompile = BTreeSet::new();
        let mut removed = BTreeSet::new();
        for (path, state) in sources {
            match state {
                SourceFileState::Added => {
                    recompile.insert(path.clone());
                }
                SourceFileState::Removed => {
                    recompile.extend(solver.source_changed(path)?);
                    removed.insert(path.clone());
                }
                SourceFileState::Changed => {
                    recompile.insert(path.clone());
                    recompile.extend(solver.source_changed(path)?);
                }
                SourceFileState::NotChanged => {}
            }
        }
        recompile.retain(|path| !removed.contains(path));

        let mut precompiled = BTreeSet::new();
        for (path, state) in sources {
            if *state != SourceFileState::Removed && !recompile.contains(path) {
                precompiled.extend(solver.compiled_outputs(output_dir, path)?);
            }
        }

        tracing::info!(
            "Incremental recompilation of {} sources ({} removed)",
            recompile.len(),
            removed.len()
        );
        tracing::debug!("Recompile set: {:?}", recompile);
        tracing::debug!("Precompiled overlay: {} class files", precompiled.len());

        let exit_code = if recompile.is_empty() {
            0
        } else {
            self.toolchain
                .backend
                .compile(output_dir, classpath, &precompiled, &recompile)?
        };

        if exit_code == 0 {
            // A removed file whose type is declared by a recompiled file was moved, its
            // fresh outputs must survive.
            let redeclared = if removed.is_empty() {
                BTreeSet::new()
            } else {
                recompile
                    .iter()
                    .map(|path| solver.type_name_of(path))
                    .collect::<Result<BTreeSet<String>>>()?
            };
            let deleted: Vec<&PathBuf> = removed
                .iter()
                .filter(|path| {
                    solver
                        .recorded_type_of(path)
                        .is_none_or(|class| !redeclared.contains(class))
                })
                .collect();

            solver.remove_sources(output_dir, deleted)?;
            solver.refresh_abi(output_dir, &recompile)?;
            solver.persist()?;
        } else {
            tracing::warn!("Compiler exited with {}, keeping previous state", exit_code);
        }

        Ok(CompileReport {
            mode: CompilationMode::Incremental,
            exit_code,
            recompiled: recompile,
        })
    }
}

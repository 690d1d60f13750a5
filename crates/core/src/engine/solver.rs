use super::graph::AbiDependencyGraph;
use crate::error::{AbiscopeError, Result};
use crate::plugin::{AbiReader, SourceTypeResolver, Toolchain};
use crate::util;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct IncrementalCacheData {
    version: u32,
    class_to_source: BTreeMap<String, String>,
    #[serde(with = "serde_bytes")]
    graph: Vec<u8>,
}

/// Serializable view of the solver state.
#[derive(Serialize, Debug)]
pub struct SolverSnapshot {
    pub cache_file: PathBuf,
    pub classes: Vec<ClassSnapshot>,
}

#[derive(Serialize, Debug)]
pub struct ClassSnapshot {
    pub name: String,
    pub source: Option<PathBuf>,
    pub public_dependencies: Vec<String>,
    pub private_dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

/// Keeps the dependency graph and the class to source mapping of one
/// (source root, output root) pair, and persists both in a single cache file.
pub struct IncrementalCompilationSolver {
    cache_file: PathBuf,
    output_extension: String,
    abi_reader: Arc<dyn AbiReader>,
    source_resolver: Arc<dyn SourceTypeResolver>,
    class_to_source: BTreeMap<String, PathBuf>,
    source_to_class: HashMap<PathBuf, String>,
    graph: AbiDependencyGraph,
    cold: bool,
}

impl IncrementalCompilationSolver {
    /// Loads the state persisted in `cache_file`. A missing or unreadable cache yields an
    /// empty solver; an unreadable one is removed.
    pub fn open(cache_file: impl Into<PathBuf>, toolchain: &Toolchain) -> Self {
        let cache_file = cache_file.into();
        let mut solver = Self {
            cache_file,
            output_extension: toolchain.output_extension.clone(),
            abi_reader: toolchain.abi_reader.clone(),
            source_resolver: toolchain.source_resolver.clone(),
            class_to_source: BTreeMap::new(),
            source_to_class: HashMap::new(),
            graph: AbiDependencyGraph::new(),
            cold: true,
        };

        if !solver.cache_file.exists() {
            tracing::debug!(
                "No incremental cache at {}, starting cold",
                solver.cache_file.display()
            );
            return solver;
        }

        match Self::load(&solver.cache_file) {
            Ok((class_to_source, graph)) => {
                tracing::debug!(
                    "Loaded incremental cache with {} classes from {}",
                    class_to_source.len(),
                    solver.cache_file.display()
                );
                solver.source_to_class = class_to_source
                    .iter()
                    .map(|(class, source)| (source.clone(), class.clone()))
                    .collect();
                solver.class_to_source = class_to_source;
                solver.graph = graph;
                solver.cold = false;
            }
            Err(e) => {
                tracing::warn!(
                    "Discarding unreadable incremental cache {}: {}",
                    solver.cache_file.display(),
                    e
                );
                let _ = std::fs::remove_file(&solver.cache_file);
            }
        }
        solver
    }

    fn load(cache_file: &Path) -> Result<(BTreeMap<String, PathBuf>, AbiDependencyGraph)> {
        let bytes = std::fs::read(cache_file)?;
        let data: IncrementalCacheData = rmp_serde::from_slice(&bytes)
            .map_err(|e| AbiscopeError::Cache(format!("MSGPACK error: {}", e)))?;
        if data.version != CACHE_VERSION {
            return Err(AbiscopeError::Cache(format!(
                "cache version {} does not match {}",
                data.version, CACHE_VERSION
            )));
        }

        let graph = AbiDependencyGraph::deserialize(&data.graph)?;
        let class_to_source = data
            .class_to_source
            .into_iter()
            .map(|(class, source)| (class, PathBuf::from(source)))
            .collect();
        Ok((class_to_source, graph))
    }

    /// True when no persisted state was loaded, so the graph knows nothing about
    /// previously compiled sources.
    pub fn is_cold(&self) -> bool {
        self.cold
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn graph(&self) -> &AbiDependencyGraph {
        &self.graph
    }

    pub fn class_to_source(&self) -> &BTreeMap<String, PathBuf> {
        &self.class_to_source
    }

    /// Top-level type declared by `source`: parsed from the file when it exists, otherwise
    /// the last recorded one.
    pub fn type_name_of(&self, source: &Path) -> Result<String> {
        if source.exists() {
            return self.source_resolver.top_level_type_name(source);
        }
        self.source_to_class
            .get(source)
            .cloned()
            .ok_or_else(|| AbiscopeError::UnknownSource(source.display().to_string()))
    }

    /// Type recorded for `source` by the last ABI refresh.
    pub fn recorded_type_of(&self, source: &Path) -> Option<&str> {
        self.source_to_class.get(source).map(String::as_str)
    }

    /// Like [`Self::type_name_of`] but trusts the recorded name first.
    fn known_type_of(&self, source: &Path) -> Result<String> {
        match self.source_to_class.get(source) {
            Some(class) => Ok(class.clone()),
            None => self.type_name_of(source),
        }
    }

    /// Sources whose classes must be recompiled because `source` changed or disappeared.
    pub fn source_changed(&self, source: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut class_names = BTreeSet::new();
        if source.exists() {
            class_names.insert(self.source_resolver.top_level_type_name(source)?);
        }
        if let Some(previous) = self.source_to_class.get(source) {
            class_names.insert(previous.clone());
        }
        if class_names.is_empty() {
            return Err(AbiscopeError::UnknownSource(source.display().to_string()));
        }

        let mut impacted = BTreeSet::new();
        for class_name in &class_names {
            for dependent in self.graph.classes_to_recompile_on_change(class_name) {
                let dependent_source = self
                    .class_to_source
                    .get(&dependent)
                    .ok_or_else(|| AbiscopeError::UnknownSource(dependent.clone()))?;
                impacted.insert(dependent_source.clone());
            }
        }

        tracing::debug!(
            "{} ({}) impacts {} sources",
            source.display(),
            class_names.iter().cloned().collect::<Vec<_>>().join(", "),
            impacted.len()
        );
        Ok(impacted)
    }

    /// Existing compiled outputs (nested ones included) of the type `source` declares.
    pub fn compiled_outputs(&self, output_dir: &Path, source: &Path) -> Result<Vec<PathBuf>> {
        let class_name = self.known_type_of(source)?;
        Ok(util::compiled_outputs(
            output_dir,
            &class_name,
            &self.output_extension,
        ))
    }

    /// Re-reads the ABI of freshly compiled `sources` into the graph.
    ///
    /// A source that now declares a different type loses the outputs and node of the type
    /// it declared before, unless another source of the batch declares that type now.
    pub fn refresh_abi<'a>(
        &mut self,
        output_dir: &Path,
        sources: impl IntoIterator<Item = &'a PathBuf>,
    ) -> Result<()> {
        let mut declared = Vec::new();
        for source in sources {
            declared.push((source, self.source_resolver.top_level_type_name(source)?));
        }

        let current: HashSet<&str> = declared.iter().map(|(_, class)| class.as_str()).collect();
        for (source, class_name) in &declared {
            let Some(previous) = self.source_to_class.get(*source).cloned() else {
                continue;
            };
            if previous != *class_name && !current.contains(previous.as_str()) {
                tracing::debug!(
                    "{} now declares {} instead of {}",
                    source.display(),
                    class_name,
                    previous
                );
                self.forget_class(output_dir, &previous, source)?;
            }
        }

        for (source, class_name) in declared {
            let unit = util::compiled_unit_path(output_dir, &class_name, &self.output_extension);
            let abi = self.abi_reader.parse_source_file_abi(&unit)?;
            self.graph.update_node(&abi)?;
            self.record(abi.class_name, source.clone());
        }
        Ok(())
    }

    fn record(&mut self, class_name: String, source: PathBuf) {
        if let Some(previous) = self.class_to_source.insert(class_name.clone(), source.clone()) {
            // The type moved here from another file.
            if previous != source && self.source_to_class.get(&previous) == Some(&class_name) {
                self.source_to_class.remove(&previous);
            }
        }
        self.source_to_class.insert(source, class_name);
    }

    /// Drops everything known about deleted `sources`, including their compiled outputs.
    pub fn remove_sources<'a>(
        &mut self,
        output_dir: &Path,
        sources: impl IntoIterator<Item = &'a PathBuf>,
    ) -> Result<()> {
        for source in sources {
            let Some(class_name) = self.source_to_class.remove(source) else {
                tracing::debug!("Removed source {} was never compiled", source.display());
                continue;
            };
            self.forget_class(output_dir, &class_name, source)?;
        }
        Ok(())
    }

    /// Deletes the outputs, node and mapping of `class_name`, unless another source has
    /// claimed that class in the meantime.
    fn forget_class(&mut self, output_dir: &Path, class_name: &str, source: &Path) -> Result<()> {
        if self.class_to_source.get(class_name).map(PathBuf::as_path) != Some(source) {
            return Ok(());
        }
        util::delete_compiled_outputs(output_dir, class_name, &self.output_extension)?;
        self.graph.delete_node(class_name);
        self.class_to_source.remove(class_name);
        Ok(())
    }

    /// Writes the state atomically (temp file, then rename).
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.cache_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = IncrementalCacheData {
            version: CACHE_VERSION,
            class_to_source: self
                .class_to_source
                .iter()
                .map(|(class, source)| (class.clone(), source.to_string_lossy().into_owned()))
                .collect(),
            graph: self.graph.serialize()?,
        };
        let bytes = rmp_serde::to_vec(&data)
            .map_err(|e| AbiscopeError::Internal(format!("MSGPACK error: {}", e)))?;

        let tmp = self.cache_file.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.cache_file)?;

        tracing::debug!(
            "Persisted {} classes to {}",
            self.class_to_source.len(),
            self.cache_file.display()
        );
        Ok(())
    }

    /// Forgets everything and deletes the cache file.
    pub fn reset(&mut self) -> Result<()> {
        self.class_to_source.clear();
        self.source_to_class.clear();
        self.graph.clear();
        match std::fs::remove_file(&self.cache_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn snapshot(&self) -> SolverSnapshot {
        let classes = self
            .graph
            .class_names()
            .into_iter()
            .map(|name| {
                let (private, public): (Vec<_>, Vec<_>) = self
                    .graph
                    .dependencies_of(&name)
                    .into_iter()
                    .partition(|(_, is_private)| *is_private);
                ClassSnapshot {
                    source: self.class_to_source.get(&name).cloned(),
                    public_dependencies: public.into_iter().map(|(n, _)| n).collect(),
                    private_dependencies: private.into_iter().map(|(n, _)| n).collect(),
                    dependents: self.graph.dependents_of(&name).into_keys().collect(),
                    name,
                }
            })
            .collect();

        SolverSnapshot {
            cache_file: self.cache_file.clone(),
            classes,
        }
    }
}

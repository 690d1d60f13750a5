use crate::error::Result;
use crate::model::SourceFileAbi;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extracts the ABI surface of a compiled unit.
pub trait AbiReader: Send + Sync {
    /// Parses `compiled_unit` (and the nested types it declares).
    ///
    /// Fails with [`crate::error::AbiscopeError::MalformedUnit`] when the binary is not a
    /// readable compiled unit.
    fn parse_source_file_abi(&self, compiled_unit: &Path) -> Result<SourceFileAbi>;
}

/// Reads the top-level type a source file declares, without compiling it.
pub trait SourceTypeResolver: Send + Sync {
    /// Internal (slash separated) name, e.g. `com/example/Base`.
    fn top_level_type_name(&self, source_file: &Path) -> Result<String>;
}

/// Invokes the real compiler.
pub trait CompilerBackend: Send + Sync {
    /// Compiles `sources` into `output_dir`.
    ///
    /// `precompiled` lists class files under `output_dir` that stay valid for this run;
    /// they must be resolvable by the compiler without being recompiled.
    /// Returns the process exit code, `0` meaning success.
    fn compile(
        &self,
        output_dir: &Path,
        classpath: &BTreeSet<PathBuf>,
        precompiled: &BTreeSet<PathBuf>,
        sources: &BTreeSet<PathBuf>,
    ) -> Result<i32>;
}

/// Everything the incremental engine needs to know about one language.
#[derive(Clone)]
pub struct Toolchain {
    pub abi_reader: Arc<dyn AbiReader>,
    pub source_resolver: Arc<dyn SourceTypeResolver>,
    pub backend: Arc<dyn CompilerBackend>,
    /// Extension of source files, without the dot
    pub source_extension: String,
    /// Extension of compiled units, without the dot
    pub output_extension: String,
}

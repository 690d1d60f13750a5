pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod plugin;
pub mod project;
pub mod util;

pub use compiler::{CompilationMode, CompileReport, Compiler};
pub use engine::{AbiDependencyGraph, IncrementalCompilationSolver};
pub use error::{AbiscopeError, Result};
pub use model::{SourceFileAbi, SourceFileState};
pub use plugin::{AbiReader, CompilerBackend, SourceTypeResolver, Toolchain};

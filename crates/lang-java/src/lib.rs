pub mod backend;
pub mod jdk;
pub mod parser;
pub mod reader;

pub use backend::JavacBackend;
pub use parser::JavaSourceResolver;
pub use reader::JavaAbiReader;

use abiscope_core::plugin::Toolchain;
use std::sync::Arc;

pub const JAVA_SOURCE_EXTENSION: &str = "java";
pub const CLASS_FILE_EXTENSION: &str = "class";

/// Class-file reader, tree-sitter resolver and the discovered `javac`.
pub fn java_toolchain() -> Toolchain {
    java_toolchain_with(JavacBackend::discover())
}

pub fn java_toolchain_with(backend: JavacBackend) -> Toolchain {
    Toolchain {
        abi_reader: Arc::new(JavaAbiReader::new()),
        source_resolver: Arc::new(JavaSourceResolver::new()),
        backend: Arc::new(backend),
        source_extension: JAVA_SOURCE_EXTENSION.to_string(),
        output_extension: CLASS_FILE_EXTENSION.to_string(),
    }
}

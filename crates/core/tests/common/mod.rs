//! Text based stand-ins for a real language, so the engine can be driven without a JDK.
//!
//! A source file looks like:
//!
//! ```text
//! com/example/Foo
//! public com/example/Bar
//! private com/example/Baz
//! nested Inner
//! ```
//!
//! The fake backend "compiles" it by copying it to `<out>/com/example/Foo.class` and
//! writing an empty `Foo$Inner.class` per `nested` line.

#![allow(dead_code)]

use abiscope_core::config::CacheLayout;
use abiscope_core::error::{AbiscopeError, Result};
use abiscope_core::project::FileSystemChangesDetector;
use abiscope_core::util::compiled_unit_path;
use abiscope_core::{
    AbiReader, CompileReport, Compiler, CompilerBackend, IncrementalCompilationSolver,
    SourceFileAbi, SourceTypeResolver, Toolchain,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn first_line(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| AbiscopeError::SourceParse {
            path: path.to_path_buf(),
            reason: "empty file".to_string(),
        })
}

pub struct TextSourceResolver;

impl SourceTypeResolver for TextSourceResolver {
    fn top_level_type_name(&self, source_file: &Path) -> Result<String> {
        first_line(source_file)
    }
}

pub struct TextAbiReader;

impl AbiReader for TextAbiReader {
    fn parse_source_file_abi(&self, compiled_unit: &Path) -> Result<SourceFileAbi> {
        let content =
            std::fs::read_to_string(compiled_unit).map_err(|e| AbiscopeError::MalformedUnit {
                path: compiled_unit.to_path_buf(),
                reason: e.to_string(),
            })?;
        let mut lines = content.lines();
        let name = lines.next().unwrap_or_default().trim().to_string();

        let mut public = Vec::new();
        let mut private = Vec::new();
        for line in lines {
            match line.trim().split_once(' ') {
                Some(("public", ty)) => public.push(ty.to_string()),
                Some(("private", ty)) => private.push(ty.to_string()),
                _ => {}
            }
        }
        Ok(SourceFileAbi::new(name, public, private))
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub sources: BTreeSet<PathBuf>,
    pub precompiled: BTreeSet<PathBuf>,
}

/// Records every call and copies sources to the output directory.
#[derive(Default)]
pub struct CopyBackend {
    invocations: Mutex<Vec<Invocation>>,
    exit_code: AtomicI32,
}

impl CopyBackend {
    pub fn fail_with(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Invocation> {
        self.invocations.lock().unwrap().last().cloned()
    }
}

impl CompilerBackend for CopyBackend {
    fn compile(
        &self,
        output_dir: &Path,
        _classpath: &BTreeSet<PathBuf>,
        precompiled: &BTreeSet<PathBuf>,
        sources: &BTreeSet<PathBuf>,
    ) -> Result<i32> {
        self.invocations.lock().unwrap().push(Invocation {
            sources: sources.clone(),
            precompiled: precompiled.clone(),
        });

        let code = self.exit_code.load(Ordering::SeqCst);
        if code != 0 {
            return Ok(code);
        }

        for source in sources {
            let content = std::fs::read_to_string(source)?;
            let name = first_line(source)?;
            let unit = compiled_unit_path(output_dir, &name, "class");
            std::fs::create_dir_all(unit.parent().unwrap())?;
            std::fs::write(&unit, &content)?;

            for line in content.lines() {
                if let Some(inner) = line.trim().strip_prefix("nested ") {
                    let nested = compiled_unit_path(output_dir, &format!("{name}${inner}"), "class");
                    std::fs::write(nested, b"")?;
                }
            }
        }
        Ok(0)
    }
}

/// A source tree plus the caches a CLI run would use.
pub struct Project {
    _dir: TempDir,
    pub src: PathBuf,
    pub out: PathBuf,
    pub layout: CacheLayout,
    pub backend: Arc<CopyBackend>,
    pub toolchain: Toolchain,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&src).unwrap();

        let backend = Arc::new(CopyBackend::default());
        let toolchain = Toolchain {
            abi_reader: Arc::new(TextAbiReader),
            source_resolver: Arc::new(TextSourceResolver),
            backend: backend.clone(),
            source_extension: "java".to_string(),
            output_extension: "class".to_string(),
        };

        Self {
            layout: CacheLayout::new(dir.path().join("cache")),
            _dir: dir,
            src,
            out,
            backend,
            toolchain,
        }
    }

    pub fn source(&self, file: &str) -> PathBuf {
        self.src.join(file)
    }

    pub fn output(&self, class_name: &str) -> PathBuf {
        compiled_unit_path(&self.out, class_name, "class")
    }

    /// Writes `src/<file>` with a type declaration line followed by `lines`.
    pub fn write(&self, file: &str, class_name: &str, lines: &[&str]) {
        let mut content = format!("{class_name}\n");
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        let path = self.source(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn delete(&self, file: &str) {
        std::fs::remove_file(self.source(file)).unwrap();
    }

    pub fn cache_file(&self) -> PathBuf {
        self.layout.incremental_cache_file(&self.src, &self.out)
    }

    pub fn solver(&self) -> IncrementalCompilationSolver {
        IncrementalCompilationSolver::open(self.cache_file(), &self.toolchain)
    }

    /// Detects changes, compiles, then saves or clears the change detector state.
    pub fn build(&self) -> CompileReport {
        let mut detector = FileSystemChangesDetector::new(self.layout.filesystem_dir());
        let classpath_changed = detector
            .is_classpath_changed(&self.src, &self.out, &[])
            .unwrap();
        let status = detector.source_status(&self.src, &self.out, "java").unwrap();

        let compiler = Compiler::new(self.toolchain.clone());
        let report = compiler
            .compile_sources(
                &BTreeSet::new(),
                classpath_changed,
                &self.out,
                &self.cache_file(),
                &status,
            )
            .unwrap();

        if report.is_success() {
            detector.save_state(&self.src, &self.out).unwrap();
        } else {
            detector.clear_cache(&self.src, &self.out).unwrap();
        }
        report
    }
}

pub fn paths(project: &Project, files: &[&str]) -> BTreeSet<PathBuf> {
    files.iter().map(|f| project.source(f)).collect()
}

mod clear;
mod compile;
mod inspect;

use abiscope_core::error::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "abiscope",
    version,
    about = "ABI-aware incremental compiler driver for Java",
    long_about = "Abiscope tracks which types each compiled class exposes in its public ABI and, \
                  after a change, recompiles only the sources whose dependencies changed in a way \
                  that can affect them. javac runs as a blocking child process without a timeout."
)]
pub struct Cli {
    /// Print debug logs to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a source tree, incrementally when possible
    #[command(
        long_about = "Compiles every .java file under PATH_TO_SOURCES. The first run, and any run \
                            after a classpath change, recompiles everything; later runs only recompile \
                            changed sources and the sources depending on their ABI. Exits with javac's \
                            exit code, or 1 when no sources are found."
    )]
    Compile {
        /// Root directory of the Java sources
        #[arg(value_name = "PATH_TO_SOURCES")]
        sources: PathBuf,
        /// Classpath entries (jars or directories), separated by ':'
        #[arg(long, short = 'c', visible_alias = "cp", value_delimiter = ':')]
        classpath: Vec<PathBuf>,
        /// Output directory for class files. Defaults to `<PATH_TO_SOURCES>-output`
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Drop the incremental caches of a source tree
    Clear {
        #[arg(value_name = "PATH_TO_SOURCES")]
        sources: PathBuf,
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Print the recorded dependency graph as JSON
    Inspect {
        #[arg(value_name = "PATH_TO_SOURCES")]
        sources: PathBuf,
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

/// Parses arguments, runs the command and returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    let _guard = abiscope_core::logging::init_logging("cli", cli.debug);

    let result = match cli.command {
        Commands::Compile {
            sources,
            classpath,
            output,
        } => compile::run(&sources, &classpath, output.as_deref()),
        Commands::Clear { sources, output } => {
            clear::run(&sources, output.as_deref()).map(|_| 0)
        }
        Commands::Inspect { sources, output } => {
            inspect::run(&sources, output.as_deref()).map(|_| 0)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    }
}

/// Canonical source root and absolute output root. The output defaults to a
/// `<sources>-output` sibling of the source root.
pub(crate) fn resolve_roots(sources: &Path, output: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    let source_root = sources.canonicalize()?;
    let output_root = match output {
        Some(output) => std::path::absolute(output)?,
        None => {
            let name = source_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "sources".to_string());
            source_root.with_file_name(format!("{name}-output"))
        }
    };
    Ok((source_root, output_root))
}

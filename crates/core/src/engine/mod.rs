pub mod graph;
pub mod solver;
pub mod storage;

pub use graph::AbiDependencyGraph;
pub use solver::{IncrementalCompilationSolver, SolverSnapshot};

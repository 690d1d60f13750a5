//! Flat, index-based persistence model of the dependency graph.

use serde::{Deserialize, Serialize};

pub const STORAGE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeDirection {
    Incoming,
    Outgoing,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct StorageGraph {
    pub version: u32,
    /// String pool, referenced by index from nodes and edges
    pub names: Vec<String>,
    pub nodes: Vec<StorageNode>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StorageNode {
    pub name: u32,
    pub edges: Vec<StorageEdge>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageEdge {
    pub direction: EdgeDirection,
    pub is_private: bool,
    pub peer: u32,
}

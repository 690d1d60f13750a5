use super::storage::{EdgeDirection, STORAGE_VERSION, StorageEdge, StorageGraph, StorageNode};
use crate::error::{AbiscopeError, Result};
use crate::model::SourceFileAbi;
use lasso::{Rodeo, Spur};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Edge stored on a class node. Every `Incoming` edge on a dependent has exactly one
/// `Outgoing` mirror with the same flag on the type it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiDependencyEdge {
    Incoming { is_private: bool, depends_on: Spur },
    Outgoing { is_private: bool, dependent: Spur },
}

impl AbiDependencyEdge {
    fn direction(&self) -> EdgeDirection {
        match self {
            AbiDependencyEdge::Incoming { .. } => EdgeDirection::Incoming,
            AbiDependencyEdge::Outgoing { .. } => EdgeDirection::Outgoing,
        }
    }

    fn is_private(&self) -> bool {
        match *self {
            AbiDependencyEdge::Incoming { is_private, .. }
            | AbiDependencyEdge::Outgoing { is_private, .. } => is_private,
        }
    }

    fn peer(&self) -> Spur {
        match *self {
            AbiDependencyEdge::Incoming { depends_on, .. } => depends_on,
            AbiDependencyEdge::Outgoing { dependent, .. } => dependent,
        }
    }

    fn mirrored(&self, owner: Spur) -> AbiDependencyEdge {
        match *self {
            AbiDependencyEdge::Incoming { is_private, .. } => AbiDependencyEdge::Outgoing {
                is_private,
                dependent: owner,
            },
            AbiDependencyEdge::Outgoing { is_private, .. } => AbiDependencyEdge::Incoming {
                is_private,
                depends_on: owner,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ClassNode {
    edges: HashSet<AbiDependencyEdge>,
}

impl ClassNode {
    /// A node is real once its own ABI contributed at least one dependency.
    fn is_real(&self) -> bool {
        self.edges
            .iter()
            .any(|e| matches!(e, AbiDependencyEdge::Incoming { .. }))
    }

    fn dependencies(&self) -> impl Iterator<Item = (Spur, bool)> + '_ {
        self.edges.iter().filter_map(|e| match *e {
            AbiDependencyEdge::Incoming {
                is_private,
                depends_on,
            } => Some((depends_on, is_private)),
            AbiDependencyEdge::Outgoing { .. } => None,
        })
    }

    fn dependents(&self) -> impl Iterator<Item = (Spur, bool)> + '_ {
        self.edges.iter().filter_map(|e| match *e {
            AbiDependencyEdge::Outgoing {
                is_private,
                dependent,
            } => Some((dependent, is_private)),
            AbiDependencyEdge::Incoming { .. } => None,
        })
    }
}

/// Type-level dependency graph keyed by internal class name.
#[derive(Debug, Default)]
pub struct AbiDependencyGraph {
    names: Rodeo,
    nodes: HashMap<Spur, ClassNode>,
}

impl AbiDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.key(class_name)
            .is_some_and(|key| self.nodes.contains_key(&key))
    }

    pub fn is_real(&self, class_name: &str) -> bool {
        self.key(class_name).is_some_and(|key| self.is_real_key(key))
    }

    pub fn class_names(&self) -> BTreeSet<String> {
        self.nodes
            .keys()
            .map(|key| self.names.resolve(key).to_string())
            .collect()
    }

    /// Types `class_name` depends on, with their `is_private` flag.
    pub fn dependencies_of(&self, class_name: &str) -> BTreeMap<String, bool> {
        self.node(class_name)
            .map(|node| self.resolve_all(node.dependencies()))
            .unwrap_or_default()
    }

    /// Types depending on `class_name`, with the flag of their reference.
    pub fn dependents_of(&self, class_name: &str) -> BTreeMap<String, bool> {
        self.node(class_name)
            .map(|node| self.resolve_all(node.dependents()))
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.names = Rodeo::default();
    }

    /// Records the dependencies of a class seen for the first time.
    pub fn add_node(&mut self, abi: &SourceFileAbi) -> Result<()> {
        let class = self.names.get_or_intern(&abi.class_name);
        if self.is_real_key(class) {
            return Err(AbiscopeError::AlreadyExists(abi.class_name.clone()));
        }

        self.nodes.entry(class).or_default();
        for (type_name, is_private) in abi.referenced_types() {
            let depends_on = self.names.get_or_intern(type_name);
            self.link(class, depends_on, is_private);
        }
        Ok(())
    }

    /// Brings the edges of `abi.class_name` in line with `abi`, touching only what differs.
    pub fn update_node(&mut self, abi: &SourceFileAbi) -> Result<()> {
        let class = self.names.get_or_intern(&abi.class_name);
        if !self.is_real_key(class) {
            return self.add_node(abi);
        }

        let previous: HashMap<Spur, bool> = self
            .nodes
            .get(&class)
            .map(|node| node.dependencies().collect())
            .unwrap_or_default();

        let mut next: HashMap<Spur, bool> = HashMap::new();
        for (type_name, is_private) in abi.referenced_types() {
            next.insert(self.names.get_or_intern(type_name), is_private);
        }

        for (&depends_on, &was_private) in &previous {
            match next.get(&depends_on) {
                None => self.unlink(class, depends_on, was_private),
                Some(&is_private) if is_private != was_private => {
                    self.unlink(class, depends_on, was_private);
                    self.link(class, depends_on, is_private);
                }
                Some(_) => {}
            }
        }

        for (&depends_on, &is_private) in &next {
            if !previous.contains_key(&depends_on) {
                self.link(class, depends_on, is_private);
            }
        }
        Ok(())
    }

    /// Removes a node together with both sides of each of its edges.
    /// Dependents survive, minus their edge to the removed node.
    pub fn delete_node(&mut self, class_name: &str) -> bool {
        let Some(key) = self.key(class_name) else {
            return false;
        };
        let Some(node) = self.nodes.remove(&key) else {
            return false;
        };

        for edge in node.edges {
            if let Some(peer) = self.nodes.get_mut(&edge.peer()) {
                peer.edges.remove(&edge.mirrored(key));
            }
        }
        true
    }

    /// Classes to recompile when the ABI of `class_name` changes.
    ///
    /// Every direct dependent is included. The walk only continues through dependents that
    /// reference the changed type publicly, since a private reference cannot leak the change
    /// into the dependent's own ABI.
    pub fn classes_to_recompile_on_change(&self, class_name: &str) -> BTreeSet<String> {
        let Some(root) = self.key(class_name) else {
            return BTreeSet::new();
        };

        let mut impacted: HashSet<Spur> = HashSet::new();
        let mut visited: HashSet<Spur> = HashSet::from([root]);
        let mut worklist = vec![root];

        while let Some(current) = worklist.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for (dependent, is_private) in node.dependents() {
                impacted.insert(dependent);
                if !is_private && visited.insert(dependent) {
                    worklist.push(dependent);
                }
            }
        }

        impacted.remove(&root);
        impacted
            .into_iter()
            .map(|key| self.names.resolve(&key).to_string())
            .collect()
    }

    /// Edges whose mirror is missing, rendered for diagnostics. Empty on a healthy graph.
    pub fn mirror_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (&owner, node) in &self.nodes {
            for edge in &node.edges {
                let mirrored = edge.mirrored(owner);
                let present = self
                    .nodes
                    .get(&edge.peer())
                    .is_some_and(|peer| peer.edges.contains(&mirrored));
                if !present {
                    violations.push(format!(
                        "{} -[{:?}, private={}]-> {}",
                        self.names.resolve(&owner),
                        edge.direction(),
                        edge.is_private(),
                        self.names.resolve(&edge.peer())
                    ));
                }
            }
        }
        violations.sort();
        violations
    }

    // ---- Serialization support ----

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let storage = self.to_storage();
        let bytes = rmp_serde::to_vec(&storage)
            .map_err(|e| AbiscopeError::Internal(format!("MSGPACK error: {}", e)))?;

        zstd::encode_all(&bytes[..], 0)
            .map_err(|e| AbiscopeError::Internal(format!("Zstd compression failed: {}", e)))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let decompressed = zstd::decode_all(bytes)
            .map_err(|e| AbiscopeError::Cache(format!("Zstd decompression failed: {}", e)))?;

        let storage: StorageGraph = rmp_serde::from_slice(&decompressed)
            .map_err(|e| AbiscopeError::Cache(format!("MSGPACK error: {}", e)))?;

        Self::from_storage(storage)
    }

    fn to_storage(&self) -> StorageGraph {
        let mut names: Vec<String> = Vec::new();
        let mut pool: HashMap<Spur, u32> = HashMap::new();
        let mut intern = |key: Spur| -> u32 {
            *pool.entry(key).or_insert_with(|| {
                names.push(self.names.resolve(&key).to_string());
                (names.len() - 1) as u32
            })
        };

        let mut ordered: Vec<(&str, Spur, &ClassNode)> = self
            .nodes
            .iter()
            .map(|(&key, node)| (self.names.resolve(&key), key, node))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));

        let mut nodes = Vec::with_capacity(ordered.len());
        for (_, key, node) in ordered {
            let name = intern(key);
            let mut edges: Vec<StorageEdge> = node
                .edges
                .iter()
                .map(|edge| StorageEdge {
                    direction: edge.direction(),
                    is_private: edge.is_private(),
                    peer: intern(edge.peer()),
                })
                .collect();
            edges.sort();
            nodes.push(StorageNode { name, edges });
        }

        StorageGraph {
            version: STORAGE_VERSION,
            names,
            nodes,
        }
    }

    fn from_storage(storage: StorageGraph) -> Result<Self> {
        if storage.version != STORAGE_VERSION {
            return Err(AbiscopeError::Cache(format!(
                "unsupported graph version {}",
                storage.version
            )));
        }

        let mut graph = Self::new();
        let keys: Vec<Spur> = storage
            .names
            .iter()
            .map(|name| graph.names.get_or_intern(name))
            .collect();
        let lookup = |idx: u32| -> Result<Spur> {
            keys.get(idx as usize).copied().ok_or_else(|| {
                AbiscopeError::Cache(format!("name index {} out of bounds", idx))
            })
        };

        for stored in storage.nodes {
            let owner = lookup(stored.name)?;
            let node = graph.nodes.entry(owner).or_default();
            for edge in stored.edges {
                let peer = lookup(edge.peer)?;
                node.edges.insert(match edge.direction {
                    EdgeDirection::Incoming => AbiDependencyEdge::Incoming {
                        is_private: edge.is_private,
                        depends_on: peer,
                    },
                    EdgeDirection::Outgoing => AbiDependencyEdge::Outgoing {
                        is_private: edge.is_private,
                        dependent: peer,
                    },
                });
            }
        }
        Ok(graph)
    }

    // ---- Internal helpers ----

    fn key(&self, class_name: &str) -> Option<Spur> {
        self.names.get(class_name)
    }

    fn node(&self, class_name: &str) -> Option<&ClassNode> {
        self.key(class_name).and_then(|key| self.nodes.get(&key))
    }

    fn is_real_key(&self, key: Spur) -> bool {
        self.nodes.get(&key).is_some_and(ClassNode::is_real)
    }

    fn resolve_all(&self, edges: impl Iterator<Item = (Spur, bool)>) -> BTreeMap<String, bool> {
        edges
            .map(|(key, is_private)| (self.names.resolve(&key).to_string(), is_private))
            .collect()
    }

    fn link(&mut self, dependent: Spur, depends_on: Spur, is_private: bool) {
        self.nodes
            .entry(dependent)
            .or_default()
            .edges
            .insert(AbiDependencyEdge::Incoming {
                is_private,
                depends_on,
            });
        self.nodes
            .entry(depends_on)
            .or_default()
            .edges
            .insert(AbiDependencyEdge::Outgoing {
                is_private,
                dependent,
            });
    }

    fn unlink(&mut self, dependent: Spur, depends_on: Spur, is_private: bool) {
        if let Some(node) = self.nodes.get_mut(&dependent) {
            node.edges.remove(&AbiDependencyEdge::Incoming {
                is_private,
                depends_on,
            });
        }
        if let Some(node) = self.nodes.get_mut(&depends_on) {
            node.edges.remove(&AbiDependencyEdge::Outgoing {
                is_private,
                dependent,
            });
        }
    }

    /// Name-resolved view of every edge, independent of interning order.
    fn edge_map(&self) -> BTreeMap<&str, BTreeSet<(EdgeDirection, bool, &str)>> {
        self.nodes
            .iter()
            .map(|(key, node)| {
                let edges = node
                    .edges
                    .iter()
                    .map(|e| (e.direction(), e.is_private(), self.names.resolve(&e.peer())))
                    .collect();
                (self.names.resolve(key), edges)
            })
            .collect()
    }
}

impl PartialEq for AbiDependencyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.edge_map() == other.edge_map()
    }
}

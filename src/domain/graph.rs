//! Dependency graph for services
//!
//! Orders services so that every prerequisite named in `depends_on`,
//! `links` or `volumes_from` is started first. Uses petgraph for graph
//! operations.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

use super::compose::ComposeDocument;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency cycle between services: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),
}

/// Why one service must start before another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    DependsOn,
    Link,
    VolumesFrom,
}

impl EdgeKind {
    /// Links join networks unconditionally, `depends_on` only on request
    fn network_strength(self) -> u8 {
        match self {
            EdgeKind::Link => 2,
            EdgeKind::DependsOn => 1,
            EdgeKind::VolumesFrom => 0,
        }
    }
}

/// A dependency graph over service names
///
/// Node indices follow insertion order, which is the declaration order of
/// the services and serves as the tie-breaker when ordering.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Edge direction: prerequisite -> dependent
    graph: DiGraph<String, EdgeKind>,

    /// Map from service name to node index
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds the graph of all services of a document
    pub fn from_document(doc: &ComposeDocument) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        for name in doc.services.keys() {
            graph.add_service(name);
        }

        for (name, service) in &doc.services {
            for dep in service.depends_on_names() {
                graph.add_dependency(name, dep, EdgeKind::DependsOn)?;
            }
            for dep in service.link_targets() {
                graph.add_dependency(name, dep, EdgeKind::Link)?;
            }
            for dep in service.volumes_from_services() {
                graph.add_dependency(name, dep, EdgeKind::VolumesFrom)?;
            }
        }

        Ok(graph)
    }

    /// Adds a service to the graph
    pub fn add_service(&mut self, name: &str) {
        if !self.node_map.contains_key(name) {
            let idx = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), idx);
        }
    }

    /// Adds a dependency edge: `service` needs `depends_on` started first
    ///
    /// Repeated relations between the same pair collapse into one edge,
    /// keeping the kind with the strongest network effect. Cycles are
    /// accepted here and reported by the ordering methods.
    pub fn add_dependency(&mut self, service: &str, depends_on: &str, kind: EdgeKind) -> Result<(), GraphError> {
        let service_idx = self.index(service)?;
        let dep_idx = self.index(depends_on)?;

        match self.graph.find_edge(dep_idx, service_idx) {
            Some(edge) => {
                if kind.network_strength() > self.graph[edge].network_strength() {
                    self.graph[edge] = kind;
                }
            }
            None => {
                self.graph.add_edge(dep_idx, service_idx, kind);
            }
        }
        Ok(())
    }

    fn index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.node_map
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::ServiceNotFound(name.to_string()))
    }

    /// Returns the services taking part in a cycle, in declaration order
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.find_edge(component[0], component[0]).is_some()
            })
            .flatten()
            .collect();

        if members.is_empty() {
            return None;
        }

        members.sort();
        Some(
            members
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).cloned())
                .collect(),
        )
    }

    /// Returns all services with prerequisites before dependents
    ///
    /// Among the services whose prerequisites are all placed, the one
    /// declared first comes next, so the order is stable across runs.
    pub fn creation_order(&self) -> Result<Vec<String>, GraphError> {
        if let Some(cycle) = self.find_cycle() {
            return Err(GraphError::Cycle(cycle));
        }

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(self.graph[idx].clone());
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                in_degree[target.index()] -= 1;
                if in_degree[target.index()] == 0 {
                    ready.push(Reverse(target));
                }
            }
        }

        Ok(order)
    }

    /// Returns all services with dependents before prerequisites
    pub fn teardown_order(&self) -> Result<Vec<String>, GraphError> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }

    /// Groups services that have to share a network
    ///
    /// Linked services always resolve each other by name; `depends_on`
    /// relations join groups only when `with_depends_on` is set. Groups of a
    /// single service are dropped. Groups and their members are listed in
    /// declaration order.
    pub fn network_groups(&self, with_depends_on: bool) -> Vec<Vec<String>> {
        let mut sets = UnionFind::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            let joins = match edge.weight() {
                EdgeKind::Link => true,
                EdgeKind::DependsOn => with_depends_on,
                EdgeKind::VolumesFrom => false,
            };
            if joins {
                sets.union(edge.source().index(), edge.target().index());
            }
        }

        let mut groups: Vec<(usize, Vec<String>)> = Vec::new();
        for idx in self.graph.node_indices() {
            let root = sets.find(idx.index());
            let name = self.graph[idx].clone();
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, members)) => members.push(name),
                None => groups.push((root, vec![name])),
            }
        }

        groups
            .into_iter()
            .map(|(_, members)| members)
            .filter(|members| members.len() > 1)
            .collect()
    }
}

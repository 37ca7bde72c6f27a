//! Resource dependency graph.
//!
//! Resources are added in declaration order. A resource may only reference
//! resources added before it, so the graph is acyclic by construction and a
//! dangling or forward reference is caught at the `add` call that makes it.
//! Execution order is computed with Kahn's algorithm and alphabetical
//! tie-breaking, so two graphs with the same resources always agree.

use super::error::SynthError;
use super::types::{LogicalId, ResourceDecl, ResourceKind};
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};

/// An acyclic, insertion-ordered set of resource declarations.
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    resources: IndexMap<LogicalId, ResourceDecl>,
}

impl StackGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. Fails on a duplicate logical id or on a reference to
    /// a resource that has not been added yet.
    pub fn add(&mut self, resource: ResourceDecl) -> Result<LogicalId, SynthError> {
        if self.resources.contains_key(&resource.logical_id) {
            return Err(SynthError::DuplicateLogicalId(resource.logical_id));
        }
        for dep in resource.references() {
            if !self.resources.contains_key(&dep) {
                return Err(SynthError::DanglingReference {
                    from: resource.logical_id.clone(),
                    to: dep,
                });
            }
        }
        let id = resource.logical_id.clone();
        self.resources.insert(id.clone(), resource);
        Ok(id)
    }

    pub fn get(&self, id: &LogicalId) -> Option<&ResourceDecl> {
        self.resources.get(id)
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDecl> {
        self.resources.values()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDecl> {
        self.resources.values().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Direct dependencies of a resource.
    pub fn dependencies_of(&self, id: &LogicalId) -> Vec<LogicalId> {
        self.resources
            .get(id)
            .map(ResourceDecl::references)
            .unwrap_or_default()
    }

    /// Every `(dependent, dependency)` edge, in declaration order.
    pub fn edges(&self) -> Vec<(LogicalId, LogicalId)> {
        self.resources
            .values()
            .flat_map(|r| {
                r.references()
                    .into_iter()
                    .map(move |dep| (r.logical_id.clone(), dep))
            })
            .collect()
    }

    /// Topological order using Kahn's algorithm with alphabetical
    /// tie-breaking.
    pub fn execution_order(&self) -> Vec<LogicalId> {
        let mut in_degree: HashMap<&LogicalId, usize> = HashMap::new();
        let mut adjacency: HashMap<&LogicalId, Vec<&LogicalId>> = HashMap::new();

        for id in self.resources.keys() {
            in_degree.insert(id, 0);
            adjacency.insert(id, Vec::new());
        }

        let edges = self.edges();
        for (dependent, dependency) in &edges {
            // Both ends exist: `add` rejects dangling references.
            let (Some((dependent, _)), Some((dependency, _))) = (
                self.resources.get_key_value(dependent),
                self.resources.get_key_value(dependency),
            ) else {
                continue;
            };
            if let Some(next) = adjacency.get_mut(dependency) {
                next.push(dependent);
            }
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree += 1;
            }
        }

        let mut zero_degree: Vec<&LogicalId> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(id, _)| *id)
            .collect();
        zero_degree.sort();
        let mut queue: VecDeque<&LogicalId> = zero_degree.into_iter().collect();

        let mut order = Vec::with_capacity(self.resources.len());
        while let Some(current) = queue.pop_front() {
            order.push(current.clone());

            let mut next_ready: Vec<&LogicalId> = Vec::new();
            if let Some(neighbors) = adjacency.get(current) {
                for neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            next_ready.push(*neighbor);
                        }
                    }
                }
            }
            next_ready.sort();
            queue.extend(next_ready);
        }

        order
    }
}

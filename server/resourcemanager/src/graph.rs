/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Typed directed relationship graph.
//!
//! Adjacency is kept as two maps, `outgoing` and `incoming`, updated
//! together on every edge mutation. One graph-level reader/writer lock
//! guards all operations; the `*_locked` variants operate on the inner
//! structure for callers that already hold the write lock (the resource
//! manager's composite operations). Node removal is planned as a dry run
//! first so a restrict rule anywhere in a cascade rejects the whole
//! operation without mutating anything.

use crate::error::GraphError;
use crate::schema::RelationshipSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Graph node identity: the `(service, kind, id)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub service: String,
    pub kind: String,
    pub id: String,
}

impl NodeId {
    pub fn new(service: &str, kind: &str, id: &str) -> Self {
        NodeId {
            service: service.to_string(),
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// Store key of the record backing this node.
    pub fn state_key(&self) -> String {
        common::resource_key(&self.service, &self.kind, &self.id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.kind, self.id)
    }
}

/// Relationship type carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeType {
    Contains,
    Uses,
    AttachedTo,
    References,
}

/// What deleting a dependency does to its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteBehavior {
    /// Reject the delete while the edge exists.
    Restrict,
    /// Delete the dependent too, recursively.
    Cascade,
    /// Drop the edge, keep the dependent.
    SetNull,
}

/// Directed edge `from -> to`; `from` is the dependent, `to` the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub metadata: HashMap<String, String>,
}

/// Validation switches for edge admission.
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    /// Reject edges the schema does not cover (lenient mode warns instead).
    pub strict_validation: bool,
    pub cycle_detection: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            strict_validation: true,
            cycle_detection: true,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct GraphInner {
    nodes: HashMap<NodeId, HashMap<String, String>>,
    outgoing: HashMap<NodeId, Vec<Edge>>,
    incoming: HashMap<NodeId, Vec<Edge>>,
}

impl GraphInner {
    fn push_edge(&mut self, edge: Edge) {
        self.outgoing
            .entry(edge.from.clone())
            .or_default()
            .push(edge.clone());
        self.incoming.entry(edge.to.clone()).or_default().push(edge);
    }

    fn drop_edge(&mut self, from: &NodeId, to: &NodeId, edge_type: EdgeType) -> bool {
        let mut dropped = false;
        if let Some(edges) = self.outgoing.get_mut(from) {
            let before = edges.len();
            edges.retain(|e| !(e.to == *to && e.edge_type == edge_type));
            dropped = edges.len() != before;
        }
        if let Some(edges) = self.incoming.get_mut(to) {
            edges.retain(|e| !(e.from == *from && e.edge_type == edge_type));
        }
        dropped
    }

    /// Remove a node and every incident edge from both adjacency maps.
    fn detach_node(&mut self, id: &NodeId) {
        for edge in self.outgoing.remove(id).unwrap_or_default() {
            if let Some(edges) = self.incoming.get_mut(&edge.to) {
                edges.retain(|e| e.from != *id || e.edge_type != edge.edge_type);
            }
        }
        for edge in self.incoming.remove(id).unwrap_or_default() {
            if let Some(edges) = self.outgoing.get_mut(&edge.from) {
                edges.retain(|e| e.to != *id || e.edge_type != edge.edge_type);
            }
        }
        self.nodes.remove(id);
    }
}

/// Typed directed graph with schema-validated edges and delete-behavior
/// enforcement.
pub struct RelationshipGraph {
    inner: RwLock<GraphInner>,
    schema: RelationshipSchema,
    config: GraphConfig,
}

impl RelationshipGraph {
    pub fn new(schema: RelationshipSchema, config: GraphConfig) -> Self {
        RelationshipGraph {
            inner: RwLock::new(GraphInner::default()),
            schema,
            config,
        }
    }

    pub(crate) fn write_inner(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    // -- public operations (acquire the graph lock) --

    pub fn add_node(&self, id: NodeId, metadata: HashMap<String, String>) -> Result<(), GraphError> {
        let mut inner = self.write_inner();
        self.add_node_locked(&mut inner, id, metadata)
    }

    /// Remove `id`, applying the schema's delete behavior to each incoming
    /// edge and `default_behavior` to edges without a rule. Returns every
    /// node removed (the target first, then cascaded dependents).
    pub fn remove_node(
        &self,
        id: &NodeId,
        default_behavior: DeleteBehavior,
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut inner = self.write_inner();
        self.remove_node_locked(&mut inner, id, default_behavior)
    }

    pub fn add_edge(
        &self,
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
        metadata: HashMap<String, String>,
    ) -> Result<(), GraphError> {
        let mut inner = self.write_inner();
        self.add_edge_locked(&mut inner, from, to, edge_type, metadata)
    }

    pub fn remove_edge(
        &self,
        from: &NodeId,
        to: &NodeId,
        edge_type: EdgeType,
    ) -> Result<(), GraphError> {
        let mut inner = self.write_inner();
        self.remove_edge_locked(&mut inner, from, to, edge_type)
    }

    // -- read operations --

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.read_inner().nodes.contains_key(id)
    }

    pub fn node_metadata(&self, id: &NodeId) -> Option<HashMap<String, String>> {
        self.read_inner().nodes.get(id).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.read_inner().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.read_inner().outgoing.values().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.read_inner().nodes.keys().cloned().collect();
        ids.sort_by_key(|n| n.to_string());
        ids
    }

    /// Direct dependents: sources of incoming edges.
    pub fn dependents(&self, id: &NodeId) -> Vec<NodeId> {
        self.read_inner()
            .incoming
            .get(id)
            .map(|edges| edges.iter().map(|e| e.from.clone()).collect())
            .unwrap_or_default()
    }

    /// Direct dependencies: targets of outgoing edges.
    pub fn dependencies(&self, id: &NodeId) -> Vec<NodeId> {
        self.read_inner()
            .outgoing
            .get(id)
            .map(|edges| edges.iter().map(|e| e.to.clone()).collect())
            .unwrap_or_default()
    }

    /// Transitive dependents, BFS over incoming edges. The order is
    /// deterministic for a given graph state.
    pub fn all_dependents(&self, id: &NodeId) -> Vec<NodeId> {
        let inner = self.read_inner();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut result = Vec::new();
        queue.push_back(id.clone());
        seen.insert(id.clone());
        while let Some(current) = queue.pop_front() {
            for edge in inner.incoming.get(&current).into_iter().flatten() {
                if seen.insert(edge.from.clone()) {
                    result.push(edge.from.clone());
                    queue.push_back(edge.from.clone());
                }
            }
        }
        result
    }

    /// Every edge incident to `id`, incoming and outgoing.
    pub fn edges_of(&self, id: &NodeId) -> Vec<Edge> {
        let inner = self.read_inner();
        let mut edges: Vec<Edge> = inner.outgoing.get(id).cloned().unwrap_or_default();
        edges.extend(inner.incoming.get(id).cloned().unwrap_or_default());
        edges
    }

    /// Whether `id` can be deleted, and the dependents blocking it.
    ///
    /// An incoming edge blocks when its schema rule is restrict; edges the
    /// schema does not cover are treated as restrict, the conservative
    /// reading.
    pub fn can_delete(&self, id: &NodeId) -> (bool, Vec<NodeId>) {
        let inner = self.read_inner();
        let mut blockers = Vec::new();
        for edge in inner.incoming.get(id).into_iter().flatten() {
            let behavior = self
                .schema
                .rule_for(&edge.from.kind, &edge.to.kind, edge.edge_type)
                .map(|r| r.on_delete)
                .unwrap_or(DeleteBehavior::Restrict);
            if behavior == DeleteBehavior::Restrict {
                blockers.push(edge.from.clone());
            }
        }
        (blockers.is_empty(), blockers)
    }

    // -- locked variants, for callers already holding the write lock --

    pub(crate) fn has_node_locked(&self, inner: &GraphInner, id: &NodeId) -> bool {
        inner.nodes.contains_key(id)
    }

    pub(crate) fn node_metadata_locked(
        &self,
        inner: &GraphInner,
        id: &NodeId,
    ) -> Option<HashMap<String, String>> {
        inner.nodes.get(id).cloned()
    }

    pub(crate) fn edges_of_locked(&self, inner: &GraphInner, id: &NodeId) -> Vec<Edge> {
        let mut edges: Vec<Edge> = inner.outgoing.get(id).cloned().unwrap_or_default();
        edges.extend(inner.incoming.get(id).cloned().unwrap_or_default());
        edges
    }

    pub(crate) fn add_node_locked(
        &self,
        inner: &mut GraphInner,
        id: NodeId,
        metadata: HashMap<String, String>,
    ) -> Result<(), GraphError> {
        if inner.nodes.contains_key(&id) {
            return Err(GraphError::NodeExists(id));
        }
        inner.nodes.insert(id, metadata);
        Ok(())
    }

    pub(crate) fn add_edge_locked(
        &self,
        inner: &mut GraphInner,
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
        metadata: HashMap<String, String>,
    ) -> Result<(), GraphError> {
        if !inner.nodes.contains_key(&from) {
            return Err(GraphError::NodeNotFound(from));
        }
        if !inner.nodes.contains_key(&to) {
            return Err(GraphError::NodeNotFound(to));
        }
        if !self.schema.covers(&from.kind, &to.kind, edge_type) {
            if self.config.strict_validation {
                return Err(GraphError::Validation {
                    from_kind: from.kind,
                    to_kind: to.kind,
                    edge_type,
                });
            }
            warn!(%from, %to, ?edge_type, "accepting edge outside the relationship schema");
        }
        if self.config.cycle_detection && Self::reaches(inner, &to, &from) {
            return Err(GraphError::Cycle { from, to });
        }
        // Re-adding the same edge replaces its metadata.
        inner.drop_edge(&from, &to, edge_type);
        inner.push_edge(Edge {
            from,
            to,
            edge_type,
            metadata,
        });
        Ok(())
    }

    pub(crate) fn remove_edge_locked(
        &self,
        inner: &mut GraphInner,
        from: &NodeId,
        to: &NodeId,
        edge_type: EdgeType,
    ) -> Result<(), GraphError> {
        if inner.drop_edge(from, to, edge_type) {
            Ok(())
        } else {
            Err(GraphError::EdgeNotFound {
                from: from.clone(),
                to: to.clone(),
                edge_type,
            })
        }
    }

    pub(crate) fn remove_node_locked(
        &self,
        inner: &mut GraphInner,
        id: &NodeId,
        default_behavior: DeleteBehavior,
    ) -> Result<Vec<NodeId>, GraphError> {
        if !inner.nodes.contains_key(id) {
            return Err(GraphError::NodeNotFound(id.clone()));
        }
        // Dry run first: a restrict rule anywhere in the cascade rejects
        // the whole operation before any mutation.
        let mut removed = Vec::new();
        self.plan_removal(inner, id, default_behavior, &mut removed)?;
        for node in &removed {
            inner.detach_node(node);
        }
        Ok(removed)
    }

    fn plan_removal(
        &self,
        inner: &GraphInner,
        id: &NodeId,
        default_behavior: DeleteBehavior,
        removed: &mut Vec<NodeId>,
    ) -> Result<(), GraphError> {
        if removed.contains(id) {
            return Ok(());
        }
        removed.push(id.clone());

        let mut blockers = Vec::new();
        let mut cascades = Vec::new();
        for edge in inner.incoming.get(id).into_iter().flatten() {
            if removed.contains(&edge.from) {
                continue;
            }
            let behavior = self
                .schema
                .rule_for(&edge.from.kind, &edge.to.kind, edge.edge_type)
                .map(|r| r.on_delete)
                .unwrap_or(default_behavior);
            match behavior {
                DeleteBehavior::Restrict => blockers.push(edge.from.clone()),
                DeleteBehavior::Cascade => cascades.push(edge.from.clone()),
                DeleteBehavior::SetNull => {}
            }
        }
        if !blockers.is_empty() {
            return Err(GraphError::DependencyViolation {
                id: id.clone(),
                blockers,
            });
        }
        for dependent in cascades {
            self.plan_removal(inner, &dependent, default_behavior, removed)?;
        }
        Ok(())
    }

    /// Bounded DFS over outgoing edges: is `target` reachable from `start`?
    fn reaches(inner: &GraphInner, start: &NodeId, target: &NodeId) -> bool {
        if start == target {
            return true;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![start.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for edge in inner.outgoing.get(&current).into_iter().flatten() {
                if edge.to == *target {
                    return true;
                }
                stack.push(edge.to.clone());
            }
        }
        false
    }
}

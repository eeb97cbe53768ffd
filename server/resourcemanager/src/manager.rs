/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Atomic composition of the state store and the relationship graph.
//!
//! Every composite operation runs under the graph's write lock, so an
//! observer serialized behind either structure sees store and graph
//! consistent with each other: no node without a record, no record
//! without a node.

use crate::error::{GraphError, ResourceError};
use crate::graph::{DeleteBehavior, EdgeType, NodeId, RelationshipGraph};
use common::Store;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

pub struct ResourceManager {
    store: Arc<Store>,
    graph: Arc<RelationshipGraph>,
}

impl ResourceManager {
    pub fn new(store: Arc<Store>, graph: Arc<RelationshipGraph>) -> Self {
        ResourceManager { store, graph }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The underlying graph, for read queries (`can_delete`, dependents)
    /// and for the lenient seeding path. Mutations outside the atomic API
    /// must not be mixed with it.
    pub fn graph(&self) -> &Arc<RelationshipGraph> {
        &self.graph
    }

    /// Write `record` under the node's state key and register the node,
    /// atomically. If node registration fails the store write is rolled
    /// back (restoring any value the key held before).
    pub fn create_resource<T: Serialize>(
        &self,
        node: &NodeId,
        metadata: HashMap<String, String>,
        record: &T,
    ) -> Result<(), ResourceError> {
        let mut inner = self.graph.write_inner();
        let state_key = node.state_key();
        let prior = self.store.get_raw(&state_key).ok();
        self.store.set(&state_key, record)?;
        if let Err(e) = self.graph.add_node_locked(&mut inner, node.clone(), metadata) {
            match prior {
                Some(value) => {
                    if let Err(rollback) = self.store.set(&state_key, &value) {
                        return Err(ResourceError::Rollback {
                            cause: e.to_string(),
                            rollback: rollback.to_string(),
                        });
                    }
                }
                None => self.store.delete(&state_key),
            }
            return Err(e.into());
        }
        debug!(node = %node, "created resource");
        Ok(())
    }

    /// Remove the node (honoring delete behaviors) and delete the store
    /// records of everything the removal took with it. Returns the removed
    /// node ids, the target first.
    ///
    /// Each record is confirmed present before deletion; a missing record
    /// means store and graph diverged, and the graph side is restored
    /// before the error is returned.
    pub fn delete_resource(
        &self,
        node: &NodeId,
        default_behavior: DeleteBehavior,
    ) -> Result<Vec<NodeId>, ResourceError> {
        let mut inner = self.graph.write_inner();

        // Snapshot for rollback before any mutation.
        let snapshots: Vec<(NodeId, HashMap<String, String>)> = {
            let meta = self.graph.node_metadata_locked(&inner, node);
            match meta {
                Some(m) => vec![(node.clone(), m)],
                None => return Err(GraphError::NodeNotFound(node.clone()).into()),
            }
        };
        let edges = self.graph.edges_of_locked(&inner, node);

        let removed = self
            .graph
            .remove_node_locked(&mut inner, node, default_behavior)?;

        for removed_node in &removed {
            let key = removed_node.state_key();
            if let Err(cause) = self.store.get_raw(&key) {
                // Store and graph diverged; put the graph back.
                if let Err(rollback) = self.restore(&mut inner, &snapshots, &edges) {
                    error!(node = %node, "rollback failed after store divergence");
                    return Err(ResourceError::Rollback {
                        cause: cause.to_string(),
                        rollback: rollback.to_string(),
                    });
                }
                return Err(cause.into());
            }
            self.store.delete(&key);
        }
        debug!(node = %node, removed = removed.len(), "deleted resource");
        Ok(removed)
    }

    /// Add one edge under the write lock, subject to schema validation and
    /// cycle detection.
    pub fn add_relationship(
        &self,
        from: &NodeId,
        to: &NodeId,
        edge_type: EdgeType,
        metadata: HashMap<String, String>,
    ) -> Result<(), ResourceError> {
        let mut inner = self.graph.write_inner();
        self.graph
            .add_edge_locked(&mut inner, from.clone(), to.clone(), edge_type, metadata)?;
        Ok(())
    }

    /// Remove one edge under the write lock.
    pub fn remove_relationship(
        &self,
        from: &NodeId,
        to: &NodeId,
        edge_type: EdgeType,
    ) -> Result<(), ResourceError> {
        let mut inner = self.graph.write_inner();
        self.graph
            .remove_edge_locked(&mut inner, from, to, edge_type)?;
        Ok(())
    }

    fn restore(
        &self,
        inner: &mut crate::graph::GraphInner,
        snapshots: &[(NodeId, HashMap<String, String>)],
        edges: &[crate::graph::Edge],
    ) -> Result<(), GraphError> {
        for (node, metadata) in snapshots {
            if !self.graph.has_node_locked(inner, node) {
                self.graph
                    .add_node_locked(inner, node.clone(), metadata.clone())?;
            }
        }
        for edge in edges {
            self.graph.add_edge_locked(
                inner,
                edge.from.clone(),
                edge.to.clone(),
                edge.edge_type,
                edge.metadata.clone(),
            )?;
        }
        Ok(())
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphConfig;
    use crate::schema::default_schema;
    use serde_json::json;

    fn manager() -> ResourceManager {
        ResourceManager::new(
            Arc::new(Store::new()),
            Arc::new(RelationshipGraph::new(default_schema(), GraphConfig::default())),
        )
    }

    fn node(kind: &str, id: &str) -> NodeId {
        NodeId::new("ec2", kind, id)
    }

    #[test]
    fn test_create_writes_store_and_graph_together() {
        let mgr = manager();
        let vpc = node("vpcs", "vpc-1");
        mgr.create_resource(&vpc, HashMap::new(), &json!({ "state": "pending" }))
            .unwrap();
        assert!(mgr.store().exists(&vpc.state_key()));
        assert!(mgr.graph().has_node(&vpc));
    }

    #[test]
    fn test_create_duplicate_rolls_back_store_write() {
        let mgr = manager();
        let vpc = node("vpcs", "vpc-1");
        mgr.create_resource(&vpc, HashMap::new(), &json!({ "state": "pending" }))
            .unwrap();
        // Second create fails on the node and must not clobber parity.
        let err = mgr
            .create_resource(&vpc, HashMap::new(), &json!({ "state": "other" }))
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Graph(GraphError::NodeExists(_))
        ));
        // The original record was restored by the rollback.
        let record = mgr.store().get_raw(&vpc.state_key()).unwrap();
        assert_eq!(record["state"], "pending");
        assert!(mgr.graph().has_node(&vpc));
    }

    #[test]
    fn test_delete_removes_store_records_of_cascade() {
        let mgr = manager();
        let instance = node("instances", "i-1");
        let eni = node("network-interfaces", "eni-1");
        mgr.create_resource(&instance, HashMap::new(), &json!({ "state": "running" }))
            .unwrap();
        mgr.create_resource(&eni, HashMap::new(), &json!({ "state": "in-use" }))
            .unwrap();
        mgr.add_relationship(&eni, &instance, EdgeType::AttachedTo, HashMap::new())
            .unwrap();

        let removed = mgr
            .delete_resource(&instance, DeleteBehavior::Restrict)
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!mgr.store().exists(&instance.state_key()));
        assert!(!mgr.store().exists(&eni.state_key()));
        assert!(!mgr.graph().has_node(&eni));
    }

    #[test]
    fn test_delete_restricted_leaves_everything() {
        let mgr = manager();
        let vpc = node("vpcs", "vpc-1");
        let subnet = node("subnets", "subnet-1");
        mgr.create_resource(&vpc, HashMap::new(), &json!({ "state": "available" }))
            .unwrap();
        mgr.create_resource(&subnet, HashMap::new(), &json!({ "state": "available" }))
            .unwrap();
        mgr.add_relationship(&subnet, &vpc, EdgeType::Contains, HashMap::new())
            .unwrap();

        let err = mgr.delete_resource(&vpc, DeleteBehavior::Restrict).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Graph(GraphError::DependencyViolation { .. })
        ));
        assert!(mgr.store().exists(&vpc.state_key()));
        assert!(mgr.graph().has_node(&vpc));
    }

    #[test]
    fn test_parity_after_mixed_operations() {
        let mgr = manager();
        let vpc = node("vpcs", "vpc-1");
        let subnet = node("subnets", "subnet-1");
        mgr.create_resource(&vpc, HashMap::new(), &json!({ "state": "available" }))
            .unwrap();
        mgr.create_resource(&subnet, HashMap::new(), &json!({ "state": "pending" }))
            .unwrap();
        mgr.add_relationship(&subnet, &vpc, EdgeType::Contains, HashMap::new())
            .unwrap();
        mgr.delete_resource(&subnet, DeleteBehavior::Restrict).unwrap();
        mgr.delete_resource(&vpc, DeleteBehavior::Restrict).unwrap();

        // Every graph node has a record and vice versa.
        for n in mgr.graph().nodes() {
            assert!(mgr.store().exists(&n.state_key()));
        }
        assert_eq!(mgr.graph().node_count(), 0);
        assert!(mgr.store().list("ec2:").is_empty());
    }
}

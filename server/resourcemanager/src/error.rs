/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Graph and resource manager error types.

use crate::graph::{EdgeType, NodeId};
use common::StoreError;
use thiserror::Error;

/// Errors surfaced by the relationship graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node already exists: {0}")]
    NodeExists(NodeId),

    #[error("edge not found: {from} -[{edge_type:?}]-> {to}")]
    EdgeNotFound {
        from: NodeId,
        to: NodeId,
        edge_type: EdgeType,
    },

    #[error("relationship {edge_type:?} from kind {from_kind} to kind {to_kind} is not in the schema")]
    Validation {
        from_kind: String,
        to_kind: String,
        edge_type: EdgeType,
    },

    #[error("edge {from} -> {to} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },

    #[error("cannot delete {id}: blocked by {}", format_blockers(.blockers))]
    DependencyViolation { id: NodeId, blockers: Vec<NodeId> },
}

fn format_blockers(blockers: &[NodeId]) -> String {
    blockers
        .iter()
        .map(|b| b.id.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors surfaced by the atomic store+graph operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A multi-step mutation failed and the attempt to undo the earlier
    /// steps failed too; both causes are preserved.
    #[error("operation failed ({cause}); rollback also failed ({rollback})")]
    Rollback { cause: String, rollback: String },
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Relationship tracking for emulated resources.
//!
//! A typed directed graph records which resources contain, use, or are
//! attached to which others, and a schema per edge combination decides
//! what happens to dependents when a dependency is deleted. The resource
//! manager composes the graph with the state store so the two can never
//! be observed out of step.

pub mod error;
pub mod graph;
pub mod manager;
pub mod schema;

pub use error::{GraphError, ResourceError};
pub use graph::{DeleteBehavior, Edge, EdgeType, GraphConfig, NodeId, RelationshipGraph};
pub use manager::ResourceManager;
pub use schema::{EdgeRule, RelationshipSchema};

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Relationship schema: which edge combinations are legal and what
//! deleting the dependency does to the dependent.

use crate::graph::{DeleteBehavior, EdgeType};
use std::collections::HashMap;

/// Rule attached to one `(from kind, to kind, edge type)` combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRule {
    /// Applied to the dependent when the dependency is deleted while the
    /// edge exists.
    pub on_delete: DeleteBehavior,
}

/// Mapping of permitted edge combinations to their rules.
///
/// Edges outside the schema are rejected in strict validation mode and
/// accepted with a warning in lenient mode.
#[derive(Debug, Clone, Default)]
pub struct RelationshipSchema {
    rules: HashMap<(String, String, EdgeType), EdgeRule>,
}

impl RelationshipSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a permitted combination and its delete behavior.
    pub fn allow(
        &mut self,
        from_kind: &str,
        to_kind: &str,
        edge_type: EdgeType,
        on_delete: DeleteBehavior,
    ) {
        self.rules.insert(
            (from_kind.to_string(), to_kind.to_string(), edge_type),
            EdgeRule { on_delete },
        );
    }

    pub fn rule_for(
        &self,
        from_kind: &str,
        to_kind: &str,
        edge_type: EdgeType,
    ) -> Option<&EdgeRule> {
        self.rules
            .get(&(from_kind.to_string(), to_kind.to_string(), edge_type))
    }

    pub fn covers(&self, from_kind: &str, to_kind: &str, edge_type: EdgeType) -> bool {
        self.rule_for(from_kind, to_kind, edge_type).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Schema for the emulated EC2/RDS resource kinds.
///
/// Containment edges into a VPC restrict its deletion; the service layer
/// filters out the children it auto-deletes (route tables, network ACLs,
/// the default security group) before consulting the graph. Reference
/// edges to reusable objects (AMIs, key pairs, launch templates) drop
/// silently when the target goes away.
pub fn default_schema() -> RelationshipSchema {
    let mut schema = RelationshipSchema::new();

    schema.allow("subnets", "vpcs", EdgeType::Contains, DeleteBehavior::Restrict);
    schema.allow(
        "security-groups",
        "vpcs",
        EdgeType::Contains,
        DeleteBehavior::Restrict,
    );
    schema.allow(
        "route-tables",
        "vpcs",
        EdgeType::Contains,
        DeleteBehavior::Restrict,
    );
    schema.allow(
        "network-acls",
        "vpcs",
        EdgeType::Contains,
        DeleteBehavior::Restrict,
    );
    schema.allow(
        "internet-gateways",
        "vpcs",
        EdgeType::AttachedTo,
        DeleteBehavior::Restrict,
    );

    schema.allow(
        "instances",
        "subnets",
        EdgeType::Contains,
        DeleteBehavior::Restrict,
    );
    schema.allow(
        "instances",
        "security-groups",
        EdgeType::Uses,
        DeleteBehavior::Restrict,
    );
    schema.allow(
        "instances",
        "images",
        EdgeType::References,
        DeleteBehavior::SetNull,
    );
    schema.allow(
        "instances",
        "key-pairs",
        EdgeType::References,
        DeleteBehavior::SetNull,
    );
    schema.allow(
        "instances",
        "launch-templates",
        EdgeType::References,
        DeleteBehavior::SetNull,
    );

    schema.allow(
        "volumes",
        "instances",
        EdgeType::AttachedTo,
        DeleteBehavior::SetNull,
    );
    schema.allow(
        "network-interfaces",
        "subnets",
        EdgeType::Contains,
        DeleteBehavior::Cascade,
    );
    schema.allow(
        "network-interfaces",
        "instances",
        EdgeType::AttachedTo,
        DeleteBehavior::Cascade,
    );

    schema.allow(
        "security-group-rules",
        "security-groups",
        EdgeType::Contains,
        DeleteBehavior::Cascade,
    );

    schema.allow(
        "db-instances",
        "security-groups",
        EdgeType::Uses,
        DeleteBehavior::Restrict,
    );

    schema
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_restricts_vpc_children() {
        let schema = default_schema();
        let rule = schema
            .rule_for("subnets", "vpcs", EdgeType::Contains)
            .unwrap();
        assert_eq!(rule.on_delete, DeleteBehavior::Restrict);
    }

    #[test]
    fn test_default_schema_set_null_for_references() {
        let schema = default_schema();
        let rule = schema
            .rule_for("instances", "key-pairs", EdgeType::References)
            .unwrap();
        assert_eq!(rule.on_delete, DeleteBehavior::SetNull);
    }

    #[test]
    fn test_unknown_combination_is_uncovered() {
        let schema = default_schema();
        assert!(!schema.covers("vpcs", "subnets", EdgeType::Contains));
        assert!(!schema.covers("subnets", "vpcs", EdgeType::Uses));
    }
}

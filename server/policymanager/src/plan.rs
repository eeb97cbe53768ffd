/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Parsed plan structures, the boundary with the external test harness.
//!
//! The shapes follow Terraform's `show -json` output: a list of resource
//! changes with before/after attribute maps, plus the planned outputs.
//! Only the fields the rule engine consults are modeled.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    /// `managed` for real resources, `data` for data sources.
    #[serde(default)]
    pub mode: String,
    pub change: Change,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
}

impl ResourceChange {
    pub fn is_data_source(&self) -> bool {
        self.mode == "data"
    }

    /// A change whose only action is `no-op` provisions nothing.
    pub fn is_noop(&self) -> bool {
        self.change.actions.is_empty() || self.change.actions.iter().all(|a| a == "no-op")
    }

    /// The planned attribute map, if the change creates or updates.
    pub fn after(&self) -> Option<&Value> {
        self.change.after.as_ref()
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_deserializes_terraform_show_output() {
        let raw = json!({
            "resource_changes": [{
                "address": "aws_vpc.main",
                "type": "aws_vpc",
                "name": "main",
                "mode": "managed",
                "change": {
                    "actions": ["create"],
                    "before": null,
                    "after": { "cidr_block": "10.0.0.0/16" }
                }
            }],
            "outputs": { "vpc_id": { "sensitive": false } }
        });
        let plan: Plan = serde_json::from_value(raw).unwrap();
        assert_eq!(plan.resource_changes.len(), 1);
        let rc = &plan.resource_changes[0];
        assert_eq!(rc.resource_type, "aws_vpc");
        assert!(!rc.is_data_source());
        assert!(!rc.is_noop());
        assert_eq!(rc.after().unwrap()["cidr_block"], "10.0.0.0/16");
    }

    #[test]
    fn test_noop_and_data_source_detection() {
        let rc = ResourceChange {
            address: "data.aws_ami.ubuntu".into(),
            resource_type: "aws_ami".into(),
            name: "ubuntu".into(),
            mode: "data".into(),
            change: Change {
                actions: vec!["no-op".into()],
                before: None,
                after: None,
            },
        };
        assert!(rc.is_data_source());
        assert!(rc.is_noop());
    }
}

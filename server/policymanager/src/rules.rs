/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Built-in safety rules and the registry that serves them per resource
//! type.

use crate::plan::ResourceChange;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rule severity, ordered `Info < Warning < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Outcome of one rule check against one resource change.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub passed: bool,
    pub message: String,
}

impl RuleOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        RuleOutcome {
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        RuleOutcome {
            passed: false,
            message: message.into(),
        }
    }
}

/// A single safety check against one resource type.
pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn severity(&self) -> Severity;
    fn provider(&self) -> &'static str;
    fn resource_type(&self) -> &'static str;
    fn check(&self, resource: &ResourceChange) -> RuleOutcome;
}

/// Registry of built-in rules, queried per resource type.
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        RuleRegistry {
            rules: vec![
                Box::new(SgNoPublicIngress {
                    id: "aws-sg-no-public-ssh",
                    description: "Security groups must not allow SSH from 0.0.0.0/0",
                    port: 22,
                }),
                Box::new(SgNoPublicIngress {
                    id: "aws-sg-no-public-rdp",
                    description: "Security groups must not allow RDP from 0.0.0.0/0",
                    port: 3389,
                }),
                Box::new(InstanceNoPublicIp),
                Box::new(InstanceEbsOptimized),
                Box::new(DbNoPublicAccess),
                Box::new(DbStorageEncrypted),
            ],
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(Box::as_ref)
    }

    pub fn rules_for_resource(&self, resource_type: &str) -> Vec<&dyn Rule> {
        self.rules
            .iter()
            .filter(|r| r.resource_type() == resource_type)
            .map(Box::as_ref)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn attr<'a>(resource: &'a ResourceChange, name: &str) -> Option<&'a Value> {
    resource.after().and_then(|a| a.get(name))
}

fn attr_bool(resource: &ResourceChange, name: &str) -> bool {
    attr(resource, name).and_then(Value::as_bool).unwrap_or(false)
}

/// Whether any ingress rule opens `port` to the world.
fn ingress_open_to_world(resource: &ResourceChange, port: i64) -> bool {
    let Some(ingress) = attr(resource, "ingress").and_then(Value::as_array) else {
        return false;
    };
    ingress.iter().any(|rule| {
        let from = rule.get("from_port").and_then(Value::as_i64).unwrap_or(-1);
        let to = rule.get("to_port").and_then(Value::as_i64).unwrap_or(-1);
        let protocol = rule.get("protocol").and_then(Value::as_str).unwrap_or("");
        let covers_port = (from <= port && port <= to) || (from == 0 && to == 0);
        let tcp_like = protocol == "tcp" || protocol == "-1";
        let world = rule
            .get("cidr_blocks")
            .and_then(Value::as_array)
            .map(|cidrs| cidrs.iter().any(|c| c.as_str() == Some("0.0.0.0/0")))
            .unwrap_or(false);
        covers_port && tcp_like && world
    })
}

struct SgNoPublicIngress {
    id: &'static str,
    description: &'static str,
    port: i64,
}

impl Rule for SgNoPublicIngress {
    fn id(&self) -> &'static str {
        self.id
    }
    fn description(&self) -> &'static str {
        self.description
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn provider(&self) -> &'static str {
        "aws"
    }
    fn resource_type(&self) -> &'static str {
        "aws_security_group"
    }
    fn check(&self, resource: &ResourceChange) -> RuleOutcome {
        if ingress_open_to_world(resource, self.port) {
            RuleOutcome::fail(format!(
                "{} allows port {} from 0.0.0.0/0",
                resource.address, self.port
            ))
        } else {
            RuleOutcome::pass(format!("port {} is not open to the world", self.port))
        }
    }
}

struct InstanceNoPublicIp;

impl Rule for InstanceNoPublicIp {
    fn id(&self) -> &'static str {
        "aws-instance-no-public-ip"
    }
    fn description(&self) -> &'static str {
        "Instances should not request a public IP address"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn provider(&self) -> &'static str {
        "aws"
    }
    fn resource_type(&self) -> &'static str {
        "aws_instance"
    }
    fn check(&self, resource: &ResourceChange) -> RuleOutcome {
        if attr_bool(resource, "associate_public_ip_address") {
            RuleOutcome::fail(format!(
                "{} associates a public IP address",
                resource.address
            ))
        } else {
            RuleOutcome::pass("no public IP requested")
        }
    }
}

struct InstanceEbsOptimized;

impl Rule for InstanceEbsOptimized {
    fn id(&self) -> &'static str {
        "aws-instance-ebs-optimized"
    }
    fn description(&self) -> &'static str {
        "Instances should enable EBS optimization"
    }
    fn severity(&self) -> Severity {
        Severity::Info
    }
    fn provider(&self) -> &'static str {
        "aws"
    }
    fn resource_type(&self) -> &'static str {
        "aws_instance"
    }
    fn check(&self, resource: &ResourceChange) -> RuleOutcome {
        if attr_bool(resource, "ebs_optimized") {
            RuleOutcome::pass("ebs_optimized is enabled")
        } else {
            RuleOutcome::fail(format!("{} is not EBS optimized", resource.address))
        }
    }
}

struct DbNoPublicAccess;

impl Rule for DbNoPublicAccess {
    fn id(&self) -> &'static str {
        "aws-db-no-public-access"
    }
    fn description(&self) -> &'static str {
        "Database instances must not be publicly accessible"
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
    fn provider(&self) -> &'static str {
        "aws"
    }
    fn resource_type(&self) -> &'static str {
        "aws_db_instance"
    }
    fn check(&self, resource: &ResourceChange) -> RuleOutcome {
        if attr_bool(resource, "publicly_accessible") {
            RuleOutcome::fail(format!("{} is publicly accessible", resource.address))
        } else {
            RuleOutcome::pass("database is not publicly accessible")
        }
    }
}

struct DbStorageEncrypted;

impl Rule for DbStorageEncrypted {
    fn id(&self) -> &'static str {
        "aws-db-storage-encrypted"
    }
    fn description(&self) -> &'static str {
        "Database storage should be encrypted at rest"
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn provider(&self) -> &'static str {
        "aws"
    }
    fn resource_type(&self) -> &'static str {
        "aws_db_instance"
    }
    fn check(&self, resource: &ResourceChange) -> RuleOutcome {
        if attr_bool(resource, "storage_encrypted") {
            RuleOutcome::pass("storage is encrypted")
        } else {
            RuleOutcome::fail(format!("{} does not encrypt storage", resource.address))
        }
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Change;
    use serde_json::json;

    fn sg_with_ingress(ingress: Value) -> ResourceChange {
        ResourceChange {
            address: "aws_security_group.bad".into(),
            resource_type: "aws_security_group".into(),
            name: "bad".into(),
            mode: "managed".into(),
            change: Change {
                actions: vec!["create".into()],
                before: None,
                after: Some(json!({ "ingress": ingress })),
            },
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_public_ssh_fails() {
        let rc = sg_with_ingress(json!([{
            "from_port": 22, "to_port": 22, "protocol": "tcp",
            "cidr_blocks": ["0.0.0.0/0"]
        }]));
        let registry = RuleRegistry::new();
        let ssh = registry
            .all()
            .find(|r| r.id() == "aws-sg-no-public-ssh")
            .unwrap();
        assert!(!ssh.check(&rc).passed);
    }

    #[test]
    fn test_restricted_ssh_passes() {
        let rc = sg_with_ingress(json!([{
            "from_port": 22, "to_port": 22, "protocol": "tcp",
            "cidr_blocks": ["10.0.0.0/8"]
        }]));
        let registry = RuleRegistry::new();
        let ssh = registry
            .all()
            .find(|r| r.id() == "aws-sg-no-public-ssh")
            .unwrap();
        assert!(ssh.check(&rc).passed);
    }

    #[test]
    fn test_port_range_covering_ssh_fails() {
        let rc = sg_with_ingress(json!([{
            "from_port": 0, "to_port": 1024, "protocol": "tcp",
            "cidr_blocks": ["0.0.0.0/0"]
        }]));
        let registry = RuleRegistry::new();
        let ssh = registry
            .all()
            .find(|r| r.id() == "aws-sg-no-public-ssh")
            .unwrap();
        assert!(!ssh.check(&rc).passed);
    }

    #[test]
    fn test_rules_for_resource_filters_by_type() {
        let registry = RuleRegistry::new();
        let sg_rules = registry.rules_for_resource("aws_security_group");
        assert_eq!(sg_rules.len(), 2);
        assert!(registry.rules_for_resource("aws_unknown").is_empty());
    }
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Security group actions, including the per-rule records behind
//! `DescribeSecurityGroupRules`.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use axum::http::StatusCode;
use resourcemanager::{DeleteBehavior, EdgeType, NodeId};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

/// Resolve `GroupId` or, failing that, `GroupName` to a loaded record.
fn resolve_group(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    if let Some(id) = params.get("GroupId") {
        return svc.load("security-groups", id);
    }
    if let Some(name) = params.get("GroupName") {
        return svc
            .list_kind("security-groups")
            .into_iter()
            .find(|r| r["groupName"] == name.as_str())
            .ok_or_else(|| Ec2Service::not_found("security-groups", name));
    }
    Err(AwsError::missing_parameter("GroupId"))
}

/// Ip permissions from either `IpPermissions.N` groups or the flat
/// single-rule spelling (`IpProtocol`/`FromPort`/`ToPort`/`CidrIp`).
fn parse_permissions(params: &HashMap<String, String>) -> Vec<Value> {
    let groups = p::indexed_groups(params, "IpPermissions");
    if !groups.is_empty() {
        return groups
            .iter()
            .map(|group| {
                let ranges: Vec<Value> = p::indexed_groups(group, "IpRanges")
                    .iter()
                    .filter_map(|r| r.get("CidrIp"))
                    .map(|cidr| json!({ "cidrIp": cidr }))
                    .collect();
                json!({
                    "ipProtocol": group.get("IpProtocol").cloned().unwrap_or_else(|| "-1".into()),
                    "fromPort": group.get("FromPort").and_then(|v| v.parse::<i64>().ok()),
                    "toPort": group.get("ToPort").and_then(|v| v.parse::<i64>().ok()),
                    "ipRanges": { "item": ranges }
                })
            })
            .collect();
    }
    if let Some(cidr) = params.get("CidrIp") {
        return vec![json!({
            "ipProtocol": params.get("IpProtocol").cloned().unwrap_or_else(|| "-1".into()),
            "fromPort": params.get("FromPort").and_then(|v| v.parse::<i64>().ok()),
            "toPort": params.get("ToPort").and_then(|v| v.parse::<i64>().ok()),
            "ipRanges": { "item": [{ "cidrIp": cidr }] }
        })];
    }
    Vec::new()
}

fn permissions_field(egress: bool) -> &'static str {
    if egress {
        "ipPermissionsEgress"
    } else {
        "ipPermissions"
    }
}

/// Register one rule record per permission/range combination.
fn create_rule_records(
    svc: &Ec2Service,
    group_id: &str,
    permissions: &[Value],
    egress: bool,
) -> Result<(), AwsError> {
    let group_node = Ec2Service::node("security-groups", group_id);
    for perm in permissions {
        let ranges = perm["ipRanges"]["item"].as_array().cloned().unwrap_or_default();
        for range in ranges {
            let rule_id = svc.fresh_id("security-group-rules", "sgr");
            let record = json!({
                "securityGroupRuleId": rule_id,
                "groupId": group_id,
                "groupOwnerId": super::OWNER_ID,
                "isEgress": egress,
                "ipProtocol": perm["ipProtocol"],
                "fromPort": perm["fromPort"],
                "toPort": perm["toPort"],
                "cidrIpv4": range["cidrIp"]
            });
            let node = Ec2Service::node("security-group-rules", &rule_id);
            svc.resources
                .create_resource(&node, HashMap::new(), &record)?;
            svc.resources
                .add_relationship(&node, &group_node, EdgeType::Contains, HashMap::new())?;
        }
    }
    Ok(())
}

fn permission_matches(existing: &Value, wanted: &Value) -> bool {
    existing["ipProtocol"] == wanted["ipProtocol"]
        && existing["fromPort"] == wanted["fromPort"]
        && existing["toPort"] == wanted["toPort"]
        && existing["ipRanges"] == wanted["ipRanges"]
}

pub(super) fn create_security_group(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let name = Ec2Service::require(params, "GroupName")?;
    let description = Ec2Service::require(params, "GroupDescription")?;
    let vpc_id = params
        .get("VpcId")
        .cloned()
        .unwrap_or_else(|| "vpc-default".to_string());
    svc.load("vpcs", &vpc_id)?;

    let duplicate = svc
        .list_kind("security-groups")
        .into_iter()
        .any(|r| r["groupName"] == name && r["vpcId"] == vpc_id.as_str());
    if duplicate {
        return Err(AwsError::new(
            "InvalidGroup.Duplicate",
            format!("The security group '{}' already exists", name),
            StatusCode::BAD_REQUEST,
        ));
    }

    let id = svc.fresh_id("security-groups", "sg");
    let node = Ec2Service::node("security-groups", &id);
    let record = json!({
        "groupId": id,
        "groupName": name,
        "groupDescription": description,
        "vpcId": vpc_id,
        "ownerId": super::OWNER_ID,
        "ipPermissions": { "item": [] },
        "ipPermissionsEgress": { "item": [{
            "ipProtocol": "-1",
            "ipRanges": { "item": [{ "cidrIp": "0.0.0.0/0" }] }
        }]}
    });

    svc.resources
        .create_resource(&node, HashMap::new(), &record)?;
    if let Err(err) = svc.resources.add_relationship(
        &node,
        &Ec2Service::node("vpcs", &vpc_id),
        EdgeType::Contains,
        HashMap::new(),
    ) {
        let _ = svc.resources.delete_resource(&node, DeleteBehavior::Restrict);
        return Err(err.into());
    }
    svc.write_tags(&id, &Ec2Service::tag_spec_pairs(params, "security-group"))?;
    info!(group = id, name, "created security group");

    Ok(json!({ "groupId": id, "return": true }))
}

pub(super) fn describe_security_groups(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "GroupId");
    let names = p::indexed_values(params, "GroupName");

    let mut records = if ids.is_empty() {
        svc.list_kind("security-groups")
    } else {
        ids.iter()
            .map(|id| svc.load("security-groups", id))
            .collect::<Result<Vec<_>, _>>()?
    };
    if !names.is_empty() {
        records.retain(|r| {
            names
                .iter()
                .any(|n| r["groupName"].as_str() == Some(n.as_str()))
        });
    }

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["groupId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "securityGroupInfo": { "item": items } }))
}

pub(super) async fn delete_security_group(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let record = resolve_group(svc, params)?;
    let id = record["groupId"].as_str().unwrap_or_default().to_string();
    let node = Ec2Service::node("security-groups", &id);
    let key = node.state_key();

    if record["groupName"] == "default" {
        return Err(AwsError::new(
            "CannotDelete",
            "the specified group: \"default\" may not be deleted",
            StatusCode::BAD_REQUEST,
        ));
    }

    let _guard = svc.states.lock(&key).await;

    let (_, blockers) = svc.resources.graph().can_delete(&node);
    // Rule records are removed with their group; anything else blocks.
    let real_blockers: Vec<NodeId> = blockers
        .into_iter()
        .filter(|b| b.kind != "security-group-rules")
        .collect();
    if !real_blockers.is_empty() {
        return Err(AwsError::dependency_violation(&id, &real_blockers));
    }

    let removed = svc.resources.delete_resource(&node, DeleteBehavior::Restrict)?;
    for gone in removed {
        svc.drop_tag_record(&gone.id);
        svc.states.remove(&gone.state_key());
    }
    info!(group = id, "deleted security group");

    Ok(json!({ "return": true }))
}

pub(super) async fn authorize(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
    egress: bool,
) -> Result<Value, AwsError> {
    let record = resolve_group(svc, params)?;
    let id = record["groupId"].as_str().unwrap_or_default().to_string();
    let key = Ec2Service::node("security-groups", &id).state_key();

    let permissions = parse_permissions(params);
    if permissions.is_empty() {
        return Err(AwsError::missing_parameter("IpPermissions"));
    }

    let _guard = svc.states.lock(&key).await;
    let field = permissions_field(egress);
    let to_add = permissions.clone();
    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            if let Some(items) = rec[field]["item"].as_array_mut() {
                items.extend(to_add.iter().cloned());
            }
        })
        .map_err(AwsError::from)?;
    create_rule_records(svc, &id, &permissions, egress)?;
    info!(group = id, egress, rules = permissions.len(), "authorized rules");

    Ok(json!({ "return": true }))
}

pub(super) async fn revoke(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
    egress: bool,
) -> Result<Value, AwsError> {
    let record = resolve_group(svc, params)?;
    let id = record["groupId"].as_str().unwrap_or_default().to_string();
    let key = Ec2Service::node("security-groups", &id).state_key();

    let permissions = parse_permissions(params);
    if permissions.is_empty() {
        return Err(AwsError::missing_parameter("IpPermissions"));
    }

    let _guard = svc.states.lock(&key).await;
    let field = permissions_field(egress);
    let to_remove = permissions.clone();
    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            if let Some(items) = rec[field]["item"].as_array_mut() {
                items.retain(|existing| {
                    !to_remove.iter().any(|wanted| permission_matches(existing, wanted))
                });
            }
        })
        .map_err(AwsError::from)?;

    // Drop the matching rule records.
    for rule in svc.list_kind("security-group-rules") {
        let matches = rule["groupId"] == id.as_str()
            && rule["isEgress"] == egress
            && permissions.iter().any(|perm| {
                perm["ipProtocol"] == rule["ipProtocol"]
                    && perm["fromPort"] == rule["fromPort"]
                    && perm["toPort"] == rule["toPort"]
                    && perm["ipRanges"]["item"]
                        .as_array()
                        .map(|ranges| ranges.iter().any(|r| r["cidrIp"] == rule["cidrIpv4"]))
                        .unwrap_or(false)
            });
        if matches {
            if let Some(rule_id) = rule["securityGroupRuleId"].as_str() {
                let rule_node = Ec2Service::node("security-group-rules", rule_id);
                let _ = svc.resources.delete_resource(&rule_node, DeleteBehavior::Restrict);
            }
        }
    }
    info!(group = id, egress, "revoked rules");

    Ok(json!({ "return": true }))
}

pub(super) fn describe_security_group_rules(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "SecurityGroupRuleId");
    let records = if ids.is_empty() {
        svc.list_kind("security-group-rules")
    } else {
        ids.iter()
            .map(|id| svc.load("security-group-rules", id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["securityGroupRuleId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "securityGroupRuleSet": { "item": items } }))
}

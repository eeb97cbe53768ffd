/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! VPC actions.
//!
//! Creating a VPC also registers the children AWS creates implicitly: the
//! main route table, the default security group, and the default network
//! ACL. Deleting one removes those children automatically but refuses
//! while user-created dependents remain.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use resourcemanager::{DeleteBehavior, EdgeType, NodeId};
use serde_json::{json, Value};
use statemanager::ResourceKind;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Kinds removed together with their VPC instead of blocking its delete.
fn auto_deleted(svc: &Ec2Service, dependent: &NodeId) -> bool {
    match dependent.kind.as_str() {
        "route-tables" | "network-acls" => true,
        "security-groups" => svc
            .load("security-groups", &dependent.id)
            .map(|record| record["groupName"] == "default")
            .unwrap_or(false),
        _ => false,
    }
}

fn vpc_record(id: &str, cidr: &str) -> Value {
    json!({
        "vpcId": id,
        "state": "pending",
        "cidrBlock": cidr,
        "isDefault": false,
        "ownerId": super::OWNER_ID,
        "instanceTenancy": "default",
        "dhcpOptionsId": "dopt-default"
    })
}

/// Register the main route table, default security group, and default
/// network ACL for a new VPC. Nodes created so far are pushed into
/// `created` as they land, so a failing caller can unwind them.
pub(super) fn create_vpc_children(
    svc: &Ec2Service,
    vpc_id: &str,
    cidr: &str,
    created: &mut Vec<NodeId>,
) -> Result<(), AwsError> {
    let rtb_id = svc.fresh_id("route-tables", "rtb");
    let rtb = json!({
        "routeTableId": rtb_id,
        "vpcId": vpc_id,
        "ownerId": super::OWNER_ID,
        "associationSet": { "item": [{
            "routeTableAssociationId": format!("rtbassoc-{}", &rtb_id[4..]),
            "routeTableId": rtb_id,
            "main": true,
            "associationState": { "state": "associated" }
        }]},
        "routeSet": { "item": [{
            "destinationCidrBlock": cidr,
            "gatewayId": "local",
            "state": "active",
            "origin": "CreateRouteTable"
        }]}
    });

    let sg_id = svc.fresh_id("security-groups", "sg");
    let sg = json!({
        "groupId": sg_id,
        "groupName": "default",
        "groupDescription": "default VPC security group",
        "vpcId": vpc_id,
        "ownerId": super::OWNER_ID,
        "ipPermissions": { "item": [] },
        "ipPermissionsEgress": { "item": [{
            "ipProtocol": "-1",
            "ipRanges": { "item": [{ "cidrIp": "0.0.0.0/0" }] }
        }]}
    });

    let acl_id = svc.fresh_id("network-acls", "acl");
    let acl = json!({
        "networkAclId": acl_id,
        "vpcId": vpc_id,
        "default": true,
        "ownerId": super::OWNER_ID,
        "entrySet": { "item": [
            { "ruleNumber": 100, "protocol": "-1", "ruleAction": "allow",
              "egress": false, "cidrBlock": "0.0.0.0/0" },
            { "ruleNumber": 100, "protocol": "-1", "ruleAction": "allow",
              "egress": true, "cidrBlock": "0.0.0.0/0" }
        ]},
        "associationSet": { "item": [] }
    });

    let vpc_node = Ec2Service::node("vpcs", vpc_id);
    let children = [
        (Ec2Service::node("route-tables", &rtb_id), rtb),
        (Ec2Service::node("security-groups", &sg_id), sg),
        (Ec2Service::node("network-acls", &acl_id), acl),
    ];
    for (node, record) in children {
        svc.resources
            .create_resource(&node, HashMap::new(), &record)?;
        created.push(node.clone());
        svc.resources
            .add_relationship(&node, &vpc_node, EdgeType::Contains, HashMap::new())?;
    }
    Ok(())
}

pub(super) async fn create_vpc(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let cidr = Ec2Service::require(params, "CidrBlock")?;
    if !cidr.contains('/') {
        return Err(AwsError::invalid_parameter_value("CidrBlock", cidr));
    }

    let id = svc.fresh_id("vpcs", "vpc");
    let node = Ec2Service::node("vpcs", &id);
    let key = node.state_key();
    let record = vpc_record(&id, cidr);

    svc.resources
        .create_resource(&node, HashMap::new(), &record)?;
    let mut children = Vec::new();
    if let Err(err) = create_vpc_children(svc, &id, cidr, &mut children) {
        // Child registration failed: unwind the create entirely.
        for child in children.iter().rev() {
            let _ = svc.resources.delete_resource(child, DeleteBehavior::Restrict);
        }
        let _ = svc.resources.delete_resource(&node, DeleteBehavior::Restrict);
        return Err(err);
    }
    svc.write_tags(&id, &Ec2Service::tag_spec_pairs(params, "vpc"))?;

    svc.states.schedule_transition(
        &key,
        ResourceKind::Vpc,
        "available",
        Duration::from_millis(svc.delays.vpc_available_ms),
    );
    info!(vpc = id, cidr, "created vpc");

    Ok(json!({ "vpc": svc.render(&id, &record) }))
}

pub(super) fn describe_vpcs(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "VpcId");
    let records = if ids.is_empty() {
        svc.list_kind("vpcs")
    } else {
        ids.iter()
            .map(|id| svc.load("vpcs", id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["vpcId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "vpcSet": { "item": items } }))
}

pub(super) async fn delete_vpc(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "VpcId")?;
    let node = Ec2Service::node("vpcs", id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    svc.load("vpcs", id)?;

    let (_, blockers) = svc.resources.graph().can_delete(&node);
    let real_blockers: Vec<NodeId> = blockers
        .into_iter()
        .filter(|b| !auto_deleted(svc, b))
        .collect();
    if !real_blockers.is_empty() {
        return Err(AwsError::dependency_violation(id, &real_blockers));
    }

    svc.states.cancel_pending(&key);

    // Two-phase: unregister the auto-deleted children first, then the VPC.
    let children: Vec<NodeId> = svc
        .resources
        .graph()
        .dependents(&node)
        .into_iter()
        .filter(|d| auto_deleted(svc, d))
        .collect();
    for child in children {
        let removed = svc
            .resources
            .delete_resource(&child, DeleteBehavior::Restrict)?;
        for gone in removed {
            svc.drop_tag_record(&gone.id);
            svc.states.remove(&gone.state_key());
        }
    }
    let removed = svc.resources.delete_resource(&node, DeleteBehavior::Restrict)?;
    for gone in removed {
        svc.drop_tag_record(&gone.id);
        svc.states.remove(&gone.state_key());
    }
    info!(vpc = id, "deleted vpc");

    Ok(json!({ "return": true }))
}

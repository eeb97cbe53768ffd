/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Subnet actions.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use resourcemanager::{DeleteBehavior, EdgeType};
use serde_json::{json, Value};
use statemanager::ResourceKind;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

pub(super) async fn create_subnet(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let vpc_id = Ec2Service::require(params, "VpcId")?;
    let cidr = Ec2Service::require(params, "CidrBlock")?;
    svc.load("vpcs", vpc_id)?;

    let zone = params
        .get("AvailabilityZone")
        .cloned()
        .unwrap_or_else(|| format!("{}a", svc.region));

    let id = svc.fresh_id("subnets", "subnet");
    let node = Ec2Service::node("subnets", &id);
    let record = json!({
        "subnetId": id,
        "state": "pending",
        "vpcId": vpc_id,
        "cidrBlock": cidr,
        "availabilityZone": zone,
        "availableIpAddressCount": 251,
        "defaultForAz": false,
        "mapPublicIpOnLaunch": false,
        "ownerId": super::OWNER_ID,
        "assignIpv6AddressOnCreation": false
    });

    svc.resources
        .create_resource(&node, HashMap::new(), &record)?;
    if let Err(err) = svc.resources.add_relationship(
        &node,
        &Ec2Service::node("vpcs", vpc_id),
        EdgeType::Contains,
        HashMap::new(),
    ) {
        let _ = svc.resources.delete_resource(&node, DeleteBehavior::Restrict);
        return Err(err.into());
    }
    svc.write_tags(&id, &Ec2Service::tag_spec_pairs(params, "subnet"))?;

    svc.states.schedule_transition(
        &node.state_key(),
        ResourceKind::Subnet,
        "available",
        Duration::from_millis(svc.delays.subnet_available_ms),
    );
    info!(subnet = id, vpc = vpc_id, "created subnet");

    Ok(json!({ "subnet": svc.render(&id, &record) }))
}

pub(super) fn describe_subnets(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "SubnetId");
    let records = if ids.is_empty() {
        svc.list_kind("subnets")
    } else {
        ids.iter()
            .map(|id| svc.load("subnets", id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["subnetId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "subnetSet": { "item": items } }))
}

pub(super) async fn delete_subnet(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "SubnetId")?;
    let node = Ec2Service::node("subnets", id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    svc.load("subnets", id)?;

    let (ok, blockers) = svc.resources.graph().can_delete(&node);
    if !ok {
        return Err(AwsError::dependency_violation(id, &blockers));
    }

    svc.states.cancel_pending(&key);
    let removed = svc.resources.delete_resource(&node, DeleteBehavior::Restrict)?;
    for gone in removed {
        svc.drop_tag_record(&gone.id);
        svc.states.remove(&gone.state_key());
    }
    info!(subnet = id, "deleted subnet");

    Ok(json!({ "return": true }))
}

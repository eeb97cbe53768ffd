/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Instance lifecycle actions.
//!
//! Instances follow the richest state machine in the emulator: pending,
//! running, stopping, stopped, shutting-down, terminated. Termination is
//! two-phase — an immediate move to `shutting-down`, a scheduled move to
//! `terminated`, and a separately tracked removal that makes the record
//! vanish after a longer delay, the way SDK waiters expect.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use chrono::Utc;
use resourcemanager::{DeleteBehavior, EdgeType, NodeId};
use serde_json::{json, Value};
use statemanager::{validate_transition, ResourceKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// EC2 numeric state codes.
fn state_code(state: &str) -> i64 {
    match state {
        "pending" => 0,
        "running" => 16,
        "shutting-down" => 32,
        "terminated" => 48,
        "stopping" => 64,
        "stopped" => 80,
        _ => 0,
    }
}

fn state_value(state: &str) -> Value {
    json!({ "code": state_code(state), "name": state })
}

fn incorrect_instance_state(id: &str, state: &str) -> AwsError {
    AwsError::incorrect_state(
        "IncorrectInstanceState",
        format!(
            "The instance '{}' is not in a state from which it can be started/stopped (current state: {})",
            id, state
        ),
    )
}

/// Describe rendering: merged tags plus the nested `instanceState`.
fn render_instance(svc: &Ec2Service, record: &Value) -> Value {
    let id = record["instanceId"].as_str().unwrap_or_default();
    let mut rendered = svc.render(id, record);
    let state = record["state"].as_str().unwrap_or_default().to_string();
    if let Some(obj) = rendered.as_object_mut() {
        obj.remove("state");
        obj.insert("instanceState".to_string(), state_value(&state));
        obj.insert("stateName".to_string(), json!(state));
    }
    rendered
}

fn private_ip() -> String {
    let bytes = *Uuid::new_v4().as_bytes();
    format!("172.31.{}.{}", bytes[0] % 16, 4 + bytes[1] % 250)
}

struct RunTargets {
    image_id: String,
    instance_type: String,
    subnet: Value,
    group_ids: Vec<String>,
    key_name: Option<String>,
    key_pair_id: Option<String>,
    launch_template_id: Option<String>,
}

/// Validate every referenced resource before anything is created.
fn resolve_run_targets(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<RunTargets, AwsError> {
    let image_id = Ec2Service::require(params, "ImageId")?.to_string();
    svc.load("images", &image_id)?;

    let instance_type = Ec2Service::require(params, "InstanceType")?.to_string();
    if !svc
        .resources
        .store()
        .exists(&common::resource_key(super::SERVICE, "instance-types", &instance_type))
    {
        return Err(AwsError::invalid_parameter_value("InstanceType", &instance_type));
    }

    let subnet_id = params
        .get("SubnetId")
        .cloned()
        .unwrap_or_else(|| "subnet-default".to_string());
    let subnet = svc.load("subnets", &subnet_id)?;

    let mut group_ids = p::indexed_values(params, "SecurityGroupId");
    for name in p::indexed_values(params, "SecurityGroup") {
        let group = svc
            .list_kind("security-groups")
            .into_iter()
            .find(|r| r["groupName"] == name.as_str())
            .ok_or_else(|| Ec2Service::not_found("security-groups", &name))?;
        if let Some(id) = group["groupId"].as_str() {
            group_ids.push(id.to_string());
        }
    }
    if group_ids.is_empty() {
        group_ids.push("sg-default".to_string());
    }
    for group_id in &group_ids {
        svc.load("security-groups", group_id)?;
    }

    let key_name = params.get("KeyName").cloned();
    let key_pair_id = match &key_name {
        Some(name) => Some(
            svc.list_kind("key-pairs")
                .into_iter()
                .find(|r| r["keyName"] == name.as_str())
                .and_then(|r| r["keyPairId"].as_str().map(String::from))
                .ok_or_else(|| Ec2Service::not_found("key-pairs", name))?,
        ),
        None => None,
    };

    let launch_template_id = match params.get("LaunchTemplate.LaunchTemplateId") {
        Some(id) => {
            svc.load("launch-templates", id)?;
            Some(id.clone())
        }
        None => None,
    };

    Ok(RunTargets {
        image_id,
        instance_type,
        subnet,
        group_ids,
        key_name,
        key_pair_id,
        launch_template_id,
    })
}

fn instance_edges(targets: &RunTargets, subnet_id: &str) -> Vec<(NodeId, EdgeType)> {
    let mut edges = vec![
        (Ec2Service::node("subnets", subnet_id), EdgeType::Contains),
        (
            Ec2Service::node("images", &targets.image_id),
            EdgeType::References,
        ),
    ];
    for group_id in &targets.group_ids {
        edges.push((
            Ec2Service::node("security-groups", group_id),
            EdgeType::Uses,
        ));
    }
    if let Some(key_pair_id) = &targets.key_pair_id {
        edges.push((
            Ec2Service::node("key-pairs", key_pair_id),
            EdgeType::References,
        ));
    }
    if let Some(lt_id) = &targets.launch_template_id {
        edges.push((
            Ec2Service::node("launch-templates", lt_id),
            EdgeType::References,
        ));
    }
    edges
}

pub(super) async fn run_instances(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let min_count: i64 = Ec2Service::require(params, "MinCount")?
        .parse()
        .map_err(|_| AwsError::invalid_parameter_value("MinCount", &params["MinCount"]))?;
    let max_count: i64 = Ec2Service::require(params, "MaxCount")?
        .parse()
        .map_err(|_| AwsError::invalid_parameter_value("MaxCount", &params["MaxCount"]))?;
    if min_count < 1 || max_count < min_count {
        return Err(AwsError::invalid_parameter_value(
            "MaxCount",
            &max_count.to_string(),
        ));
    }

    let targets = resolve_run_targets(svc, params)?;
    let subnet_id = targets.subnet["subnetId"].as_str().unwrap_or_default().to_string();
    let vpc_id = targets.subnet["vpcId"].as_str().unwrap_or_default().to_string();
    let zone = targets.subnet["availabilityZone"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let group_set: Vec<Value> = targets
        .group_ids
        .iter()
        .filter_map(|gid| {
            let group = svc.load("security-groups", gid).ok()?;
            Some(json!({ "groupId": gid, "groupName": group["groupName"] }))
        })
        .collect();

    let reservation_id = format!("r-{}", &Uuid::new_v4().simple().to_string()[..17]);
    let tag_pairs = Ec2Service::tag_spec_pairs(params, "instance");
    let mut instances = Vec::new();

    for launch_index in 0..max_count {
        let id = svc.fresh_instance_id();
        let node = Ec2Service::node("instances", &id);
        let ip = private_ip();
        let record = json!({
            "instanceId": id,
            "state": "pending",
            "imageId": targets.image_id,
            "instanceType": targets.instance_type,
            "subnetId": subnet_id,
            "vpcId": vpc_id,
            "keyName": targets.key_name,
            "reservationId": reservation_id,
            "amiLaunchIndex": launch_index,
            "launchTime": Utc::now().to_rfc3339(),
            "placement": { "availabilityZone": zone, "tenancy": "default" },
            "privateIpAddress": ip,
            "privateDnsName": format!("ip-{}.ec2.internal", ip.replace('.', "-")),
            "architecture": "x86_64",
            "rootDeviceType": "ebs",
            "rootDeviceName": "/dev/sda1",
            "virtualizationType": "hvm",
            "hypervisor": "xen",
            "monitoring": { "state": "disabled" },
            "groupSet": { "item": group_set },
            "sourceDestCheck": true,
            "ebsOptimized": false
        });

        svc.resources
            .create_resource(&node, HashMap::new(), &record)?;
        for (target, edge_type) in instance_edges(&targets, &subnet_id) {
            if let Err(err) =
                svc.resources
                    .add_relationship(&node, &target, edge_type, HashMap::new())
            {
                // Strict-mode edge failure unwinds this instance entirely.
                let _ = svc.resources.delete_resource(&node, DeleteBehavior::SetNull);
                return Err(err.into());
            }
        }
        svc.write_tags(&id, &tag_pairs)?;

        svc.states.schedule_transition(
            &node.state_key(),
            ResourceKind::Instance,
            "running",
            Duration::from_millis(svc.delays.instance_transition_ms),
        );
        instances.push(record);
    }
    info!(
        count = instances.len(),
        image = targets.image_id,
        instance_type = targets.instance_type,
        "launched instances"
    );

    let items: Vec<Value> = instances.iter().map(|r| render_instance(svc, r)).collect();
    Ok(json!({
        "reservationId": reservation_id,
        "ownerId": super::OWNER_ID,
        "groupSet": { "item": group_set },
        "instancesSet": { "item": items }
    }))
}

pub(super) fn describe_instances(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "InstanceId");
    let records = if ids.is_empty() {
        svc.list_kind("instances")
    } else {
        ids.iter()
            .map(|id| svc.load("instances", id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    let reservations: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["instanceId"].as_str()?;
            svc.matches_filters(id, record, &filters).then(|| {
                json!({
                    "reservationId": record["reservationId"],
                    "ownerId": super::OWNER_ID,
                    "groupSet": record["groupSet"],
                    "instancesSet": { "item": [render_instance(svc, record)] }
                })
            })
        })
        .collect();

    Ok(json!({ "reservationSet": { "item": reservations } }))
}

/// Shared shape of start/stop responses.
fn state_change_item(id: &str, previous: &str, current: &str) -> Value {
    json!({
        "instanceId": id,
        "currentState": state_value(current),
        "previousState": state_value(previous)
    })
}

pub(super) async fn start_instances(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "InstanceId");
    if ids.is_empty() {
        return Err(AwsError::missing_parameter("InstanceId"));
    }

    let mut items = Vec::new();
    for id in &ids {
        let node = Ec2Service::node("instances", id);
        let key = node.state_key();
        let _guard = svc.states.lock(&key).await;

        let record = svc.load("instances", id)?;
        let current = record["state"].as_str().unwrap_or_default().to_string();
        validate_transition(ResourceKind::Instance, id, &current, "pending")
            .map_err(|_| incorrect_instance_state(id, &current))?;

        svc.resources
            .store()
            .update(&key, |rec: &mut Value| {
                rec["state"] = json!("pending");
            })
            .map_err(AwsError::from)?;
        svc.states.schedule_transition(
            &key,
            ResourceKind::Instance,
            "running",
            Duration::from_millis(svc.delays.instance_transition_ms),
        );
        info!(instance = id.as_str(), "starting instance");
        items.push(state_change_item(id, &current, "pending"));
    }

    Ok(json!({ "instancesSet": { "item": items } }))
}

pub(super) async fn stop_instances(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "InstanceId");
    if ids.is_empty() {
        return Err(AwsError::missing_parameter("InstanceId"));
    }

    let mut items = Vec::new();
    for id in &ids {
        let node = Ec2Service::node("instances", id);
        let key = node.state_key();
        let _guard = svc.states.lock(&key).await;

        let record = svc.load("instances", id)?;
        let current = record["state"].as_str().unwrap_or_default().to_string();
        validate_transition(ResourceKind::Instance, id, &current, "stopping")
            .map_err(|_| incorrect_instance_state(id, &current))?;

        svc.states.cancel_pending(&key);
        svc.resources
            .store()
            .update(&key, |rec: &mut Value| {
                rec["state"] = json!("stopping");
            })
            .map_err(AwsError::from)?;
        svc.states.schedule_transition(
            &key,
            ResourceKind::Instance,
            "stopped",
            Duration::from_millis(svc.delays.instance_transition_ms),
        );
        info!(instance = id.as_str(), "stopping instance");
        items.push(state_change_item(id, &current, "stopping"));
    }

    Ok(json!({ "instancesSet": { "item": items } }))
}

pub(super) async fn terminate_instances(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "InstanceId");
    if ids.is_empty() {
        return Err(AwsError::missing_parameter("InstanceId"));
    }

    let mut items = Vec::new();
    for id in &ids {
        let node = Ec2Service::node("instances", id);
        let key = node.state_key();
        let _guard = svc.states.lock(&key).await;

        let record = svc.load("instances", id)?;
        let current = record["state"].as_str().unwrap_or_default().to_string();

        // Terminating a terminating instance is a no-op, as on AWS.
        if current == "shutting-down" || current == "terminated" {
            items.push(state_change_item(id, &current, &current));
            continue;
        }
        validate_transition(ResourceKind::Instance, id, &current, "shutting-down")
            .map_err(|_| incorrect_instance_state(id, &current))?;

        svc.states.cancel_pending(&key);
        svc.resources
            .store()
            .update(&key, |rec: &mut Value| {
                rec["state"] = json!("shutting-down");
            })
            .map_err(AwsError::from)?;
        svc.states.schedule_transition(
            &key,
            ResourceKind::Instance,
            "terminated",
            Duration::from_millis(svc.delays.instance_transition_ms),
        );

        // Removal is tracked on its own bookkeeping key so it survives the
        // terminated transition on the same resource.
        let resources = Arc::clone(&svc.resources);
        let cleanup_node = node.clone();
        let cleanup_id = id.clone();
        svc.states.schedule_removal(
            &key,
            Duration::from_millis(svc.delays.termination_removal_ms),
            async move {
                let _ = resources.delete_resource(&cleanup_node, DeleteBehavior::SetNull);
                resources.store().delete(&format!("ec2:tags:{}", cleanup_id));
            },
        );
        info!(instance = id.as_str(), "terminating instance");
        items.push(state_change_item(id, &current, "shutting-down"));
    }

    Ok(json!({ "instancesSet": { "item": items } }))
}

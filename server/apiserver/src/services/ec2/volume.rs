/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! EBS volume actions.
//!
//! Attach requires the volume `available` and the instance `running`; the
//! attachment itself follows the attachment state table.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use chrono::Utc;
use resourcemanager::{DeleteBehavior, EdgeType};
use serde_json::{json, Value};
use statemanager::{validate_transition, ResourceKind};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

fn incorrect_volume_state(id: &str, state: &str) -> AwsError {
    AwsError::incorrect_state(
        "IncorrectState",
        format!("volume {} is in state {}", id, state),
    )
}

pub(super) async fn create_volume(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let zone = Ec2Service::require(params, "AvailabilityZone")?;
    let size = params
        .get("Size")
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AwsError::invalid_parameter_value("Size", s))
        })
        .transpose()?
        .unwrap_or(8);

    let id = svc.fresh_id("volumes", "vol");
    let node = Ec2Service::node("volumes", &id);
    let record = json!({
        "volumeId": id,
        "state": "creating",
        "size": size,
        "availabilityZone": zone,
        "volumeType": params.get("VolumeType").cloned().unwrap_or_else(|| "gp2".into()),
        "encrypted": params.get("Encrypted").map(|v| v == "true").unwrap_or(false),
        "iops": params.get("Iops").and_then(|v| v.parse::<i64>().ok()),
        "createTime": Utc::now().to_rfc3339(),
        "attachmentSet": { "item": [] }
    });

    svc.resources
        .create_resource(&node, HashMap::new(), &record)?;
    svc.write_tags(&id, &Ec2Service::tag_spec_pairs(params, "volume"))?;

    svc.states.schedule_transition(
        &node.state_key(),
        ResourceKind::Volume,
        "available",
        Duration::from_millis(svc.delays.volume_transition_ms),
    );
    info!(volume = id, size, "created volume");

    Ok(svc.render(&id, &record))
}

pub(super) fn describe_volumes(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "VolumeId");
    let records = if ids.is_empty() {
        svc.list_kind("volumes")
    } else {
        ids.iter()
            .map(|id| svc.load("volumes", id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["volumeId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "volumeSet": { "item": items } }))
}

pub(super) async fn attach_volume(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let volume_id = Ec2Service::require(params, "VolumeId")?;
    let instance_id = Ec2Service::require(params, "InstanceId")?;
    let device = Ec2Service::require(params, "Device")?;
    let volume_node = Ec2Service::node("volumes", volume_id);
    let key = volume_node.state_key();

    let _guard = svc.states.lock(&key).await;
    let volume = svc.load("volumes", volume_id)?;
    let instance = svc.load("instances", instance_id)?;

    let volume_state = volume["state"].as_str().unwrap_or_default();
    if volume_state != "available" {
        return Err(incorrect_volume_state(volume_id, volume_state));
    }
    let instance_state = instance["state"].as_str().unwrap_or_default();
    if instance_state != "running" {
        return Err(AwsError::incorrect_state(
            "IncorrectInstanceState",
            format!("instance {} is in state {}", instance_id, instance_state),
        ));
    }
    validate_transition(ResourceKind::Volume, volume_id, volume_state, "in-use")?;

    svc.resources.add_relationship(
        &volume_node,
        &Ec2Service::node("instances", instance_id),
        EdgeType::AttachedTo,
        HashMap::new(),
    )?;
    let attachment = json!({
        "volumeId": volume_id,
        "instanceId": instance_id,
        "device": device,
        "status": "attached",
        "attachTime": Utc::now().to_rfc3339(),
        "deleteOnTermination": false
    });
    let stored = attachment.clone();
    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["state"] = json!("in-use");
            rec["attachmentSet"] = json!({ "item": [stored] });
        })
        .map_err(AwsError::from)?;
    info!(volume = volume_id, instance = instance_id, device, "attached volume");

    Ok(attachment)
}

pub(super) async fn detach_volume(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let volume_id = Ec2Service::require(params, "VolumeId")?;
    let volume_node = Ec2Service::node("volumes", volume_id);
    let key = volume_node.state_key();

    let _guard = svc.states.lock(&key).await;
    let volume = svc.load("volumes", volume_id)?;

    let state = volume["state"].as_str().unwrap_or_default();
    validate_transition(ResourceKind::Volume, volume_id, state, "available")
        .map_err(|_| incorrect_volume_state(volume_id, state))?;

    let attachment = volume["attachmentSet"]["item"]
        .as_array()
        .and_then(|a| a.first())
        .cloned()
        .ok_or_else(|| incorrect_volume_state(volume_id, state))?;
    let instance_id = attachment["instanceId"].as_str().unwrap_or_default().to_string();

    svc.resources.remove_relationship(
        &volume_node,
        &Ec2Service::node("instances", &instance_id),
        EdgeType::AttachedTo,
    )?;
    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["state"] = json!("available");
            rec["attachmentSet"] = json!({ "item": [] });
        })
        .map_err(AwsError::from)?;
    info!(volume = volume_id, instance = instance_id, "detached volume");

    let mut detached = attachment;
    detached["status"] = json!("detached");
    Ok(detached)
}

pub(super) async fn delete_volume(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "VolumeId")?;
    let node = Ec2Service::node("volumes", id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    let volume = svc.load("volumes", id)?;

    let state = volume["state"].as_str().unwrap_or_default();
    if state != "available" {
        return Err(AwsError::incorrect_state(
            "VolumeInUse",
            format!("volume {} is in state {}", id, state),
        ));
    }

    svc.states.cancel_pending(&key);
    let removed = svc.resources.delete_resource(&node, DeleteBehavior::Restrict)?;
    for gone in removed {
        svc.drop_tag_record(&gone.id);
        svc.states.remove(&gone.state_key());
    }
    info!(volume = id, "deleted volume");

    Ok(json!({ "return": true }))
}

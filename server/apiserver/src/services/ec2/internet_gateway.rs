/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Internet gateway actions.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use axum::http::StatusCode;
use resourcemanager::{DeleteBehavior, EdgeType};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

pub(super) fn create_internet_gateway(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = svc.fresh_id("internet-gateways", "igw");
    let node = Ec2Service::node("internet-gateways", &id);
    let record = json!({
        "internetGatewayId": id,
        "ownerId": super::OWNER_ID,
        "attachmentSet": { "item": [] }
    });

    svc.resources
        .create_resource(&node, HashMap::new(), &record)?;
    svc.write_tags(&id, &Ec2Service::tag_spec_pairs(params, "internet-gateway"))?;
    info!(gateway = id, "created internet gateway");

    Ok(json!({ "internetGateway": svc.render(&id, &record) }))
}

pub(super) async fn attach_internet_gateway(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "InternetGatewayId")?;
    let vpc_id = Ec2Service::require(params, "VpcId")?;
    let node = Ec2Service::node("internet-gateways", id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    let record = svc.load("internet-gateways", id)?;
    svc.load("vpcs", vpc_id)?;

    let already_attached = record["attachmentSet"]["item"]
        .as_array()
        .map(|a| !a.is_empty())
        .unwrap_or(false);
    if already_attached {
        return Err(AwsError::new(
            "Resource.AlreadyAssociated",
            format!("internet gateway {} is already attached", id),
            StatusCode::BAD_REQUEST,
        ));
    }

    svc.resources.add_relationship(
        &node,
        &Ec2Service::node("vpcs", vpc_id),
        EdgeType::AttachedTo,
        HashMap::new(),
    )?;
    let attachment = json!({ "vpcId": vpc_id, "state": "available" });
    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["attachmentSet"] = json!({ "item": [attachment] });
        })
        .map_err(AwsError::from)?;
    info!(gateway = id, vpc = vpc_id, "attached internet gateway");

    Ok(json!({ "return": true }))
}

pub(super) async fn detach_internet_gateway(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "InternetGatewayId")?;
    let vpc_id = Ec2Service::require(params, "VpcId")?;
    let node = Ec2Service::node("internet-gateways", id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    let record = svc.load("internet-gateways", id)?;

    let attached_here = record["attachmentSet"]["item"]
        .as_array()
        .map(|a| a.iter().any(|att| att["vpcId"].as_str() == Some(vpc_id)))
        .unwrap_or(false);
    if !attached_here {
        return Err(AwsError::new(
            "Gateway.NotAttached",
            format!("internet gateway {} is not attached to vpc {}", id, vpc_id),
            StatusCode::BAD_REQUEST,
        ));
    }

    svc.resources
        .remove_relationship(&node, &Ec2Service::node("vpcs", vpc_id), EdgeType::AttachedTo)?;
    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["attachmentSet"] = json!({ "item": [] });
        })
        .map_err(AwsError::from)?;
    info!(gateway = id, vpc = vpc_id, "detached internet gateway");

    Ok(json!({ "return": true }))
}

pub(super) async fn delete_internet_gateway(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "InternetGatewayId")?;
    let node = Ec2Service::node("internet-gateways", id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    let record = svc.load("internet-gateways", id)?;

    let attached = record["attachmentSet"]["item"]
        .as_array()
        .map(|a| !a.is_empty())
        .unwrap_or(false);
    if attached {
        return Err(AwsError::new(
            "DependencyViolation",
            format!("internet gateway {} is still attached to a vpc", id),
            StatusCode::BAD_REQUEST,
        ));
    }

    let removed = svc.resources.delete_resource(&node, DeleteBehavior::Restrict)?;
    for gone in removed {
        svc.drop_tag_record(&gone.id);
        svc.states.remove(&gone.state_key());
    }
    info!(gateway = id, "deleted internet gateway");

    Ok(json!({ "return": true }))
}

pub(super) fn describe_internet_gateways(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "InternetGatewayId");
    let records = if ids.is_empty() {
        svc.list_kind("internet-gateways")
    } else {
        ids.iter()
            .map(|id| svc.load("internet-gateways", id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["internetGatewayId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "internetGatewaySet": { "item": items } }))
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Read-only describe actions over seeded and derived records: AMIs,
//! instance types, network interfaces, network ACLs, route tables, and
//! the per-instance attribute lookups.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Generic id-or-enumerate describe over one kind.
fn describe_kind(
    svc: &Ec2Service,
    kind: &str,
    id_field: &str,
    ids: &[String],
    params: &HashMap<String, String>,
) -> Result<Vec<Value>, AwsError> {
    let records = if ids.is_empty() {
        svc.list_kind(kind)
    } else {
        ids.iter()
            .map(|id| svc.load(kind, id))
            .collect::<Result<Vec<_>, _>>()?
    };

    let filters = Ec2Service::filters(params);
    Ok(records
        .iter()
        .filter_map(|record| {
            let id = record[id_field].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect())
}

pub(super) fn describe_images(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "ImageId");
    let items = describe_kind(svc, "images", "imageId", &ids, params)?;
    Ok(json!({ "imagesSet": { "item": items } }))
}

pub(super) fn describe_instance_types(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "InstanceType");
    let items = describe_kind(svc, "instance-types", "instanceType", &ids, params)?;
    Ok(json!({ "instanceTypeSet": { "item": items } }))
}

pub(super) fn describe_network_interfaces(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "NetworkInterfaceId");
    let items = describe_kind(svc, "network-interfaces", "networkInterfaceId", &ids, params)?;
    Ok(json!({ "networkInterfaceSet": { "item": items } }))
}

pub(super) fn describe_network_acls(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "NetworkAclId");
    let items = describe_kind(svc, "network-acls", "networkAclId", &ids, params)?;
    Ok(json!({ "networkAclSet": { "item": items } }))
}

pub(super) fn describe_route_tables(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "RouteTableId");
    let items = describe_kind(svc, "route-tables", "routeTableId", &ids, params)?;
    Ok(json!({ "routeTableSet": { "item": items } }))
}

pub(super) fn describe_instance_attribute(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = Ec2Service::require(params, "InstanceId")?;
    let attribute = Ec2Service::require(params, "Attribute")?;
    let record = svc.load("instances", id)?;

    let value = match attribute {
        "instanceType" => record["instanceType"].clone(),
        "kernel" => Value::Null,
        "ramdisk" => Value::Null,
        "userData" => Value::Null,
        "disableApiTermination" => json!(false),
        "instanceInitiatedShutdownBehavior" => json!("stop"),
        "rootDeviceName" => record["rootDeviceName"].clone(),
        "ebsOptimized" => record["ebsOptimized"].clone(),
        "sourceDestCheck" => record["sourceDestCheck"].clone(),
        "groupSet" => {
            return Ok(json!({
                "instanceId": id,
                "groupSet": record["groupSet"].clone()
            }))
        }
        other => {
            return Err(AwsError::invalid_parameter_value("Attribute", other));
        }
    };

    let mut out = serde_json::Map::new();
    out.insert("instanceId".to_string(), json!(id));
    out.insert(attribute.to_string(), json!({ "value": value }));
    Ok(Value::Object(out))
}

pub(super) fn describe_instance_credit_specifications(
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

    // Burstable families report credit specifications; others are omitted.
    let items: Vec<Value> = records
        .iter()
        .filter(|record| {
            record["instanceType"]
                .as_str()
                .map(|t| t.starts_with("t2") || t.starts_with("t3"))
                .unwrap_or(false)
        })
        .map(|record| {
            json!({
                "instanceId": record["instanceId"],
                "cpuCredits": "standard"
            })
        })
        .collect();

    Ok(json!({ "instanceCreditSpecificationSet": { "item": items } }))
}

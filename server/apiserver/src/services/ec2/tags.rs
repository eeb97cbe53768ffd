/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Tagging actions against the per-resource tag store.
//!
//! Tags live under `ec2:tags:<id>`, separate from the owning record, so
//! they survive record rewrites and merge into describe responses with
//! last-write-wins semantics.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

fn tag_pairs(params: &HashMap<String, String>) -> Vec<(String, String)> {
    p::indexed_groups(params, "Tag")
        .into_iter()
        .filter_map(|group| {
            let key = group.get("Key")?.clone();
            let value = group.get("Value").cloned().unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

pub(super) fn create_tags(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "ResourceId");
    if ids.is_empty() {
        return Err(AwsError::missing_parameter("ResourceId"));
    }
    let pairs = tag_pairs(params);
    if pairs.is_empty() {
        return Err(AwsError::missing_parameter("Tag"));
    }

    for id in &ids {
        svc.write_tags(id, &pairs)?;
    }
    info!(resources = ids.len(), tags = pairs.len(), "created tags");

    Ok(json!({ "return": true }))
}

pub(super) fn delete_tags(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "ResourceId");
    if ids.is_empty() {
        return Err(AwsError::missing_parameter("ResourceId"));
    }
    let keys: Vec<String> = tag_pairs(params).into_iter().map(|(k, _)| k).collect();

    for id in &ids {
        if keys.is_empty() {
            // No keys named: drop every tag on the resource.
            svc.drop_tag_record(id);
            continue;
        }
        let mut tags = svc.tags_of(id);
        for key in &keys {
            tags.remove(key);
        }
        svc.resources
            .store()
            .set(&format!("ec2:tags:{}", id), &Value::Object(tags))
            .map_err(AwsError::from)?;
    }

    Ok(json!({ "return": true }))
}

pub(super) fn describe_tags(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let filters = Ec2Service::filters(params);
    let resource_id_filter: Option<&Vec<String>> = filters
        .iter()
        .find(|(name, _)| name == "resource-id")
        .map(|(_, values)| values);

    let store = svc.resources.store();
    let mut items = Vec::new();
    for key in store.list("ec2:tags:") {
        let id = key.trim_start_matches("ec2:tags:").to_string();
        if let Some(wanted) = resource_id_filter {
            if !wanted.contains(&id) {
                continue;
            }
        }
        let Ok(tags) = store.get_raw(&key) else { continue };
        let Some(map) = tags.as_object() else { continue };
        for (tag_key, tag_value) in map {
            items.push(json!({
                "resourceId": id,
                "resourceType": resource_type_of(&id),
                "key": tag_key,
                "value": tag_value
            }));
        }
    }

    Ok(json!({ "tagSet": { "item": items } }))
}

/// AWS resource type from the id prefix.
fn resource_type_of(id: &str) -> &'static str {
    match id.split('-').next().unwrap_or_default() {
        "vpc" => "vpc",
        "subnet" => "subnet",
        "sg" => "security-group",
        "igw" => "internet-gateway",
        "vol" => "volume",
        "i" => "instance",
        "lt" => "launch-template",
        "key" => "key-pair",
        "rtb" => "route-table",
        "acl" => "network-acl",
        "eni" => "network-interface",
        _ => "resource",
    }
}

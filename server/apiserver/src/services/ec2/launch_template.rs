/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Launch template actions.

use super::Ec2Service;
use crate::errors::AwsError;
use crate::protocol::params as p;
use axum::http::StatusCode;
use chrono::Utc;
use resourcemanager::DeleteBehavior;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

fn find_by_name(svc: &Ec2Service, name: &str) -> Option<Value> {
    svc.list_kind("launch-templates")
        .into_iter()
        .find(|r| r["launchTemplateName"] == name)
}

pub(super) fn create_launch_template(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let name = Ec2Service::require(params, "LaunchTemplateName")?;
    if find_by_name(svc, name).is_some() {
        return Err(AwsError::new(
            "InvalidLaunchTemplateName.AlreadyExistsException",
            format!("Launch template name {} is already in use", name),
            StatusCode::BAD_REQUEST,
        ));
    }

    let id = svc.fresh_id("launch-templates", "lt");
    let record = json!({
        "launchTemplateId": id,
        "launchTemplateName": name,
        "createTime": Utc::now().to_rfc3339(),
        "createdBy": format!("arn:aws:iam::{}:root", super::OWNER_ID),
        "defaultVersionNumber": 1,
        "latestVersionNumber": 1
    });
    svc.resources.create_resource(
        &Ec2Service::node("launch-templates", &id),
        HashMap::new(),
        &record,
    )?;
    svc.write_tags(&id, &Ec2Service::tag_spec_pairs(params, "launch-template"))?;
    info!(template = name, id, "created launch template");

    Ok(json!({ "launchTemplate": svc.render(&id, &record) }))
}

pub(super) fn describe_launch_templates(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let ids = p::indexed_values(params, "LaunchTemplateId");
    let names = p::indexed_values(params, "LaunchTemplateName");

    let mut records = if ids.is_empty() {
        svc.list_kind("launch-templates")
    } else {
        ids.iter()
            .map(|id| svc.load("launch-templates", id))
            .collect::<Result<Vec<_>, _>>()?
    };
    if !names.is_empty() {
        records.retain(|r| {
            names
                .iter()
                .any(|n| r["launchTemplateName"].as_str() == Some(n.as_str()))
        });
    }

    let filters = Ec2Service::filters(params);
    let items: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            let id = record["launchTemplateId"].as_str()?;
            svc.matches_filters(id, record, &filters)
                .then(|| svc.render(id, record))
        })
        .collect();

    Ok(json!({ "launchTemplates": { "item": items } }))
}

pub(super) async fn delete_launch_template(
    svc: &Ec2Service,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let record = match (params.get("LaunchTemplateId"), params.get("LaunchTemplateName")) {
        (Some(id), _) => svc.load("launch-templates", id)?,
        (None, Some(name)) => find_by_name(svc, name)
            .ok_or_else(|| Ec2Service::not_found("launch-templates", name))?,
        (None, None) => return Err(AwsError::missing_parameter("LaunchTemplateId")),
    };
    let id = record["launchTemplateId"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let node = Ec2Service::node("launch-templates", &id);

    let _guard = svc.states.lock(&node.state_key()).await;
    let removed = svc.resources.delete_resource(&node, DeleteBehavior::SetNull)?;
    for gone in removed {
        svc.drop_tag_record(&gone.id);
        svc.states.remove(&gone.state_key());
    }
    info!(template = id, "deleted launch template");

    Ok(json!({ "launchTemplate": record }))
}

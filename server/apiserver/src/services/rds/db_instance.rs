/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! DB instance actions.
//!
//! Not-found answers are HTTP 404 with `DBInstanceNotFound`, unlike EC2's
//! 400s: Terraform's delete waiter keeps describing until it sees the
//! 404, so an instance in `deleting` is already hidden from describes.

use super::RdsService;
use crate::errors::AwsError;
use crate::protocol::params as p;
use axum::http::StatusCode;
use chrono::Utc;
use resourcemanager::{DeleteBehavior, EdgeType, NodeId};
use serde_json::{json, Map, Value};
use statemanager::{validate_transition, ResourceKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

fn db_node(id: &str) -> NodeId {
    NodeId::new(super::SERVICE, "db-instances", id)
}

fn not_found(id: &str) -> AwsError {
    AwsError::not_found(
        "DBInstanceNotFound",
        format!("DBInstance {} not found.", id),
        StatusCode::NOT_FOUND,
    )
}

fn incorrect_state(id: &str, state: &str) -> AwsError {
    AwsError::incorrect_state(
        "InvalidDBInstanceStateFault",
        format!("DBInstance {} is in state {}", id, state),
    )
}

/// Whether a record is visible to describes (deletion already hides it).
fn visible(record: &Value) -> bool {
    !matches!(
        record["state"].as_str().unwrap_or_default(),
        "deleting" | "deleted"
    )
}

fn engine_port(engine: &str) -> i64 {
    match engine {
        "postgres" | "aurora-postgresql" => 5432,
        "sqlserver-ex" | "sqlserver-se" | "sqlserver-web" | "sqlserver-ee" => 1433,
        "oracle-se2" | "oracle-ee" => 1521,
        _ => 3306,
    }
}

fn default_engine_version(engine: &str) -> &'static str {
    match engine {
        "postgres" => "15.4",
        "mariadb" => "10.11.6",
        _ => "8.0.35",
    }
}

/// Describe rendering: `DBInstanceStatus` from the internal state, tags
/// as a `TagList`, internal fields dropped.
fn render(record: &Value) -> Value {
    let mut rendered = record.clone();
    if let Some(obj) = rendered.as_object_mut() {
        let state = obj
            .remove("state")
            .and_then(|s| s.as_str().map(String::from))
            .unwrap_or_default();
        obj.insert("DBInstanceStatus".to_string(), json!(state));
        let tags = obj.remove("tags").unwrap_or_else(|| json!({}));
        let tag_items: Vec<Value> = tags
            .as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| json!({ "Key": k, "Value": v }))
                    .collect()
            })
            .unwrap_or_default();
        obj.insert("TagList".to_string(), json!({ "Tag": tag_items }));
    }
    rendered
}

fn load(svc: &RdsService, id: &str) -> Result<Value, AwsError> {
    svc.resources
        .store()
        .get_raw(&db_node(id).state_key())
        .map_err(|_| not_found(id))
}

/// Resource id from an RDS ARN (`arn:aws:rds:region:account:db:name`).
fn id_from_arn(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}

pub(super) async fn create_db_instance(
    svc: &RdsService,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = require(params, "DBInstanceIdentifier")?;
    let engine = require(params, "Engine")?;
    let class = require(params, "DBInstanceClass")?;

    let node = db_node(id);
    if svc.resources.store().exists(&node.state_key()) {
        return Err(AwsError::conflict(
            "DBInstanceAlreadyExistsFault",
            format!("DB instance {} already exists", id),
        ));
    }

    let storage = params
        .get("AllocatedStorage")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(20);
    let tags: Map<String, Value> = p::indexed_groups(params, "Tags")
        .into_iter()
        .filter_map(|g| Some((g.get("Key")?.clone(), json!(g.get("Value")?))))
        .collect();

    let record = json!({
        "DBInstanceIdentifier": id,
        "state": "creating",
        "DBInstanceClass": class,
        "Engine": engine,
        "EngineVersion": params.get("EngineVersion").cloned()
            .unwrap_or_else(|| default_engine_version(engine).to_string()),
        "AllocatedStorage": storage,
        "MasterUsername": params.get("MasterUsername").cloned().unwrap_or_else(|| "admin".into()),
        "DBName": params.get("DBName"),
        "MultiAZ": params.get("MultiAZ").map(|v| v == "true").unwrap_or(false),
        "StorageType": params.get("StorageType").cloned().unwrap_or_else(|| "gp2".into()),
        "StorageEncrypted": params.get("StorageEncrypted").map(|v| v == "true").unwrap_or(false),
        "PubliclyAccessible": params.get("PubliclyAccessible").map(|v| v == "true").unwrap_or(false),
        "BackupRetentionPeriod": params.get("BackupRetentionPeriod")
            .and_then(|v| v.parse::<i64>().ok()).unwrap_or(1),
        "DBInstanceArn": format!("arn:aws:rds:{}:123456789012:db:{}", svc.region, id),
        "InstanceCreateTime": Utc::now().to_rfc3339(),
        "Endpoint": {
            "Address": format!("{}.{}.{}.rds.amazonaws.com",
                id, &Uuid::new_v4().simple().to_string()[..12], svc.region),
            "Port": params.get("Port").and_then(|v| v.parse::<i64>().ok())
                .unwrap_or_else(|| engine_port(engine))
        },
        "AvailabilityZone": format!("{}a", svc.region),
        "DbInstancePort": 0,
        "DeletionProtection": false,
        "tags": tags
    });

    svc.resources
        .create_resource(&node, HashMap::new(), &record)?;

    // Wire up referenced security groups so their deletion is blocked.
    let group_ids = p::indexed_values(params, "VpcSecurityGroupIds");
    for group_id in &group_ids {
        let sg_node = NodeId::new("ec2", "security-groups", group_id);
        if let Err(err) =
            svc.resources
                .add_relationship(&node, &sg_node, EdgeType::Uses, HashMap::new())
        {
            let _ = svc.resources.delete_resource(&node, DeleteBehavior::Restrict);
            return Err(err.into());
        }
    }

    svc.states.schedule_transition(
        &node.state_key(),
        ResourceKind::DbInstance,
        "available",
        Duration::from_millis(svc.delays.db_instance_transition_ms),
    );
    info!(db = id, engine, class, "created db instance");

    Ok(json!({ "DBInstance": render(&record) }))
}

pub(super) fn describe_db_instances(
    svc: &RdsService,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let items: Vec<Value> = match params.get("DBInstanceIdentifier") {
        Some(id) => {
            let record = load(svc, id)?;
            if !visible(&record) {
                return Err(not_found(id));
            }
            vec![render(&record)]
        }
        None => {
            let store = svc.resources.store();
            store
                .list(&common::kind_prefix(super::SERVICE, "db-instances"))
                .iter()
                .filter_map(|key| store.get_raw(key).ok())
                .filter(visible)
                .map(|record| render(&record))
                .collect()
        }
    };

    Ok(json!({ "DBInstances": { "DBInstance": items } }))
}

pub(super) async fn delete_db_instance(
    svc: &RdsService,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = require(params, "DBInstanceIdentifier")?;
    let node = db_node(id);
    let key = node.state_key();

    let _guard = svc.states.lock(&key).await;
    let record = load(svc, id)?;
    if !visible(&record) {
        return Err(not_found(id));
    }

    let state = record["state"].as_str().unwrap_or_default().to_string();
    validate_transition(ResourceKind::DbInstance, id, &state, "deleting")
        .map_err(|_| incorrect_state(id, &state))?;

    svc.states.cancel_pending(&key);
    let updated = svc
        .resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["state"] = json!("deleting");
        })
        .map_err(AwsError::from)?;

    let resources = Arc::clone(&svc.resources);
    let cleanup_node = node.clone();
    svc.states.schedule_removal(
        &key,
        Duration::from_millis(svc.delays.db_instance_transition_ms),
        async move {
            let _ = resources.delete_resource(&cleanup_node, DeleteBehavior::SetNull);
        },
    );
    info!(db = id, "deleting db instance");

    Ok(json!({ "DBInstance": render(&updated) }))
}

pub(super) async fn modify_db_instance(
    svc: &RdsService,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let id = require(params, "DBInstanceIdentifier")?;
    let key = db_node(id).state_key();

    let _guard = svc.states.lock(&key).await;
    let record = load(svc, id)?;
    if !visible(&record) {
        return Err(not_found(id));
    }

    let state = record["state"].as_str().unwrap_or_default().to_string();
    validate_transition(ResourceKind::DbInstance, id, &state, "modifying")
        .map_err(|_| incorrect_state(id, &state))?;

    let class = params.get("DBInstanceClass").cloned();
    let storage = params
        .get("AllocatedStorage")
        .and_then(|v| v.parse::<i64>().ok());
    let updated = svc
        .resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["state"] = json!("modifying");
            if let Some(class) = &class {
                rec["DBInstanceClass"] = json!(class);
            }
            if let Some(storage) = storage {
                rec["AllocatedStorage"] = json!(storage);
            }
        })
        .map_err(AwsError::from)?;

    svc.states.schedule_transition(
        &key,
        ResourceKind::DbInstance,
        "available",
        Duration::from_millis(svc.delays.db_instance_transition_ms),
    );
    info!(db = id, "modifying db instance");

    Ok(json!({ "DBInstance": render(&updated) }))
}

/// Shared start/stop/reboot flow: validate against the table, set the
/// transitional state, schedule the follow-up.
pub(super) async fn change_db_state(
    svc: &RdsService,
    params: &HashMap<String, String>,
    transitional: &str,
    target: &str,
) -> Result<Value, AwsError> {
    let id = require(params, "DBInstanceIdentifier")?;
    let key = db_node(id).state_key();

    let _guard = svc.states.lock(&key).await;
    let record = load(svc, id)?;
    if !visible(&record) {
        return Err(not_found(id));
    }

    let state = record["state"].as_str().unwrap_or_default().to_string();
    validate_transition(ResourceKind::DbInstance, id, &state, transitional)
        .map_err(|_| incorrect_state(id, &state))?;

    let updated = svc
        .resources
        .store()
        .update(&key, |rec: &mut Value| {
            rec["state"] = json!(transitional);
        })
        .map_err(AwsError::from)?;

    svc.states.schedule_transition(
        &key,
        ResourceKind::DbInstance,
        target,
        Duration::from_millis(svc.delays.db_instance_transition_ms),
    );
    info!(db = id, from = state, to = transitional, "db state change");

    Ok(json!({ "DBInstance": render(&updated) }))
}

pub(super) fn list_tags_for_resource(
    svc: &RdsService,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let arn = require(params, "ResourceName")?;
    let record = load(svc, id_from_arn(arn))?;
    let rendered = render(&record);
    Ok(json!({ "TagList": rendered["TagList"] }))
}

pub(super) async fn add_tags_to_resource(
    svc: &RdsService,
    params: &HashMap<String, String>,
) -> Result<Value, AwsError> {
    let arn = require(params, "ResourceName")?;
    let id = id_from_arn(arn).to_string();
    let key = db_node(&id).state_key();

    let _guard = svc.states.lock(&key).await;
    load(svc, &id)?;

    let pairs: Vec<(String, String)> = p::indexed_groups(params, "Tags")
        .into_iter()
        .filter_map(|g| Some((g.get("Key")?.clone(), g.get("Value")?.clone())))
        .collect();

    svc.resources
        .store()
        .update(&key, |rec: &mut Value| {
            if !rec["tags"].is_object() {
                rec["tags"] = json!({});
            }
            if let Some(tags) = rec["tags"].as_object_mut() {
                for (k, v) in &pairs {
                    tags.insert(k.clone(), json!(v));
                }
            }
        })
        .map_err(AwsError::from)?;
    info!(db = id, tags = pairs.len(), "added tags");

    Ok(json!({}))
}

fn require<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, AwsError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AwsError::missing_parameter(name))
}

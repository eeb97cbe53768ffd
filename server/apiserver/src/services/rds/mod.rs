/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The RDS service: DB instance lifecycle with the 404-on-missing
//! describe semantics Terraform's delete waiter depends on.

pub mod db_instance;

use crate::errors::AwsError;
use crate::protocol::envelope::WireResponse;
use crate::protocol::AwsRequest;
use crate::services::{self, AwsService};
use async_trait::async_trait;
use common::setting::DelaySettings;
use resourcemanager::ResourceManager;
use statemanager::StateMachineManager;
use std::sync::Arc;

pub(crate) const SERVICE: &str = "rds";

const ACTIONS: &[&str] = &[
    "CreateDBInstance",
    "DescribeDBInstances",
    "DeleteDBInstance",
    "ModifyDBInstance",
    "StartDBInstance",
    "StopDBInstance",
    "RebootDBInstance",
    "ListTagsForResource",
    "AddTagsToResource",
];

pub struct RdsService {
    pub(crate) resources: Arc<ResourceManager>,
    pub(crate) states: Arc<StateMachineManager>,
    pub(crate) region: String,
    pub(crate) delays: DelaySettings,
}

#[async_trait]
impl AwsService for RdsService {
    fn service_name(&self) -> &'static str {
        SERVICE
    }

    fn supported_actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn handle_request(&self, req: &AwsRequest) -> WireResponse {
        services::dispatch(SERVICE, req, |action| async move {
            let params = req.params();
            match action.as_str() {
                "CreateDBInstance" => db_instance::create_db_instance(self, &params).await,
                "DescribeDBInstances" => db_instance::describe_db_instances(self, &params),
                "DeleteDBInstance" => db_instance::delete_db_instance(self, &params).await,
                "ModifyDBInstance" => db_instance::modify_db_instance(self, &params).await,
                "StartDBInstance" => {
                    db_instance::change_db_state(self, &params, "starting", "available").await
                }
                "StopDBInstance" => {
                    db_instance::change_db_state(self, &params, "stopping", "stopped").await
                }
                "RebootDBInstance" => {
                    db_instance::change_db_state(self, &params, "rebooting", "available").await
                }
                "ListTagsForResource" => db_instance::list_tags_for_resource(self, &params),
                "AddTagsToResource" => db_instance::add_tags_to_resource(self, &params).await,
                other => Err(AwsError::invalid_action(other)),
            }
        })
        .await
    }
}

impl RdsService {
    pub fn new(
        resources: Arc<ResourceManager>,
        states: Arc<StateMachineManager>,
        region: &str,
        delays: DelaySettings,
    ) -> Self {
        RdsService {
            resources,
            states,
            region: region.to_string(),
            delays,
        }
    }
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The Mirage API server: an AWS-compatible HTTP endpoint for EC2 and RDS
//! that infrastructure-as-code test runs can provision against.
//!
//! * Admit requests by SigV4 header shape and access-key existence, never
//!   by cryptographic verification.
//! * Route each request to a registered service by target header, host,
//!   path, or form action.
//! * Parse the AWS Query/EC2/JSON protocols and answer in the envelope the
//!   calling SDK expects, including protocol-correct error formats.
//! * Drive resource lifecycles through the state machine manager and keep
//!   the relationship graph and state store atomically in step.

pub mod auth;
pub mod errors;
pub mod ids;
pub mod protocol;
pub mod route;
pub mod router;
pub mod services;

use common::setting::DelaySettings;
use common::Store;
use resourcemanager::{GraphConfig, RelationshipGraph, ResourceManager};
use services::ec2::Ec2Service;
use services::rds::RdsService;
use services::AwsService;
use statemanager::StateMachineManager;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared state behind every handler.
pub struct AppState {
    pub services: Vec<Arc<dyn AwsService>>,
    pub store: Arc<Store>,
    pub states: Arc<StateMachineManager>,
    pub resources: Arc<ResourceManager>,
    pub region: String,
    /// Access keys the SigV4 admission check accepts.
    pub access_keys: HashSet<String>,
}

impl AppState {
    /// Wire up the store, graph, state machine manager, and both services,
    /// seeding the default account resources.
    pub fn new(region: &str, access_keys: &[String], delays: DelaySettings) -> Arc<Self> {
        let store = Arc::new(Store::new());
        let graph = Arc::new(RelationshipGraph::new(
            resourcemanager::schema::default_schema(),
            GraphConfig::default(),
        ));
        let states = Arc::new(StateMachineManager::new(Arc::clone(&store)));
        let resources = Arc::new(ResourceManager::new(Arc::clone(&store), graph));

        let ec2 = Arc::new(Ec2Service::new(
            Arc::clone(&resources),
            Arc::clone(&states),
            region,
            delays.clone(),
        ));
        ec2.seed_defaults();
        let rds = Arc::new(RdsService::new(
            Arc::clone(&resources),
            Arc::clone(&states),
            region,
            delays,
        ));

        Arc::new(AppState {
            services: vec![ec2, rds],
            store,
            states,
            resources,
            region: region.to_string(),
            access_keys: access_keys.iter().cloned().collect(),
        })
    }

    pub fn service_named(&self, name: &str) -> Option<&Arc<dyn AwsService>> {
        self.services.iter().find(|s| s.service_name() == name)
    }
}

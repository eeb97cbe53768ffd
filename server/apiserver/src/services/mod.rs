/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS service handlers.
//!
//! Each service owns a flat, exhaustive action table. The shared request
//! flow lives here: validate the shell, extract the action, dispatch, and
//! render the outcome in the protocol the service identity prescribes.

pub mod ec2;
pub mod rds;

use crate::errors::AwsError;
use crate::ids;
use crate::protocol::envelope::{render_error, render_success, WireResponse};
use crate::protocol::{for_service, AwsRequest};
use async_trait::async_trait;
use serde_json::Value;

/// One emulated AWS service.
#[async_trait]
pub trait AwsService: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn supported_actions(&self) -> &'static [&'static str];
    async fn handle_request(&self, req: &AwsRequest) -> WireResponse;
}

/// Shared request shell: extract the action, run the per-action handler,
/// and wrap the outcome in the service's envelope.
pub async fn dispatch<F, Fut>(service_name: &str, req: &AwsRequest, handler: F) -> WireResponse
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Result<Value, AwsError>>,
{
    let protocol = for_service(service_name);
    let request_id = ids::request_id();

    let action = match req.action() {
        Some(action) if !action.is_empty() => action,
        _ => {
            let err = AwsError::new(
                "MissingAction",
                "Could not find operation to perform",
                axum::http::StatusCode::BAD_REQUEST,
            );
            return render_error(protocol, &err, &request_id);
        }
    };

    match handler(action.clone()).await {
        Ok(data) => render_success(protocol, &action, &data, &request_id),
        Err(err) => render_error(protocol, &err, &request_id),
    }
}

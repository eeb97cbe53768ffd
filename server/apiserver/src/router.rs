/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Service resolution.
//!
//! Order: the auth middleware's credential-scope hint, then the
//! `X-Amz-Target` prefix, then S3 virtual-host patterns, then the URL
//! path prefix, then cross-referencing the action against each
//! registered service's supported set.

use crate::errors::AwsError;
use crate::protocol::AwsRequest;
use crate::services::AwsService;
use crate::AppState;
use std::sync::Arc;

/// Whether a host header looks like `<bucket>.s3.<…>.amazonaws.com`.
pub fn is_s3_virtual_host(host: &str) -> bool {
    let host = host.split(':').next().unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 3 && labels[0] != "s3" && labels.iter().skip(1).any(|l| *l == "s3")
}

/// Service name from an `X-Amz-Target` prefix such as
/// `DynamoDB_20120810.ListTables`.
fn target_service(target: &str) -> String {
    let prefix = target.split('.').next().unwrap_or(target);
    prefix
        .split('_')
        .next()
        .unwrap_or(prefix)
        .to_ascii_lowercase()
}

pub fn resolve<'a>(
    state: &'a AppState,
    req: &AwsRequest,
) -> Result<&'a Arc<dyn AwsService>, AwsError> {
    if let Some(hint) = &req.service_hint {
        if let Some(service) = state.service_named(hint) {
            return Ok(service);
        }
    }

    if let Some(target) = req.target() {
        let name = target_service(target);
        if let Some(service) = state.service_named(&name) {
            return Ok(service);
        }
    }

    if let Some(host) = req.host() {
        if is_s3_virtual_host(host) {
            if let Some(service) = state.service_named("s3") {
                return Ok(service);
            }
        }
    }

    let first_segment = req.path.trim_start_matches('/').split('/').next().unwrap_or("");
    if !first_segment.is_empty() {
        if let Some(service) = state.service_named(first_segment) {
            return Ok(service);
        }
    }

    if let Some(action) = req.action() {
        for service in &state.services {
            if service.supported_actions().contains(&action.as_str()) {
                return Ok(service);
            }
        }
    }

    Err(AwsError::invalid_service(
        "Unable to determine service for request",
    ))
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use common::setting::DelaySettings;
    use std::collections::HashMap;

    fn state() -> Arc<AppState> {
        AppState::new("us-east-1", &["test".to_string()], DelaySettings::default())
    }

    fn form_request(body: &str) -> AwsRequest {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        AwsRequest {
            method: "POST".into(),
            path: "/".into(),
            query: String::new(),
            headers,
            body: Bytes::from(body.to_string()),
            service_hint: None,
        }
    }

    #[test]
    fn test_hint_wins() {
        let state = state();
        let mut req = form_request("Action=DescribeVpcs");
        req.service_hint = Some("rds".to_string());
        assert_eq!(resolve(&state, &req).unwrap().service_name(), "rds");
    }

    #[test]
    fn test_action_cross_reference() {
        let state = state();
        let req = form_request("Action=CreateDBInstance&DBInstanceIdentifier=db1");
        assert_eq!(resolve(&state, &req).unwrap().service_name(), "rds");

        let req = form_request("Action=DescribeVpcs");
        assert_eq!(resolve(&state, &req).unwrap().service_name(), "ec2");
    }

    #[test]
    fn test_path_prefix() {
        let state = state();
        let mut req = form_request("Action=Whatever");
        req.path = "/ec2".to_string();
        assert_eq!(resolve(&state, &req).unwrap().service_name(), "ec2");
    }

    #[test]
    fn test_unresolvable_is_invalid_service() {
        let state = state();
        let req = form_request("Action=NoSuchAction");
        let err = match resolve(&state, &req) {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(err.code, "InvalidService");
    }

    #[test]
    fn test_s3_virtual_host_detection() {
        assert!(is_s3_virtual_host("bucket.s3.amazonaws.com"));
        assert!(is_s3_virtual_host("bucket.s3.us-east-1.amazonaws.com:4566"));
        assert!(!is_s3_virtual_host("s3.amazonaws.com"));
        assert!(!is_s3_virtual_host("localhost:4566"));
        assert!(!is_s3_virtual_host("example.com"));
    }
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Shared helpers for the end-to-end tests: a server with millisecond
//! transition delays, request builders with a valid admission header,
//! and a minimal XML field extractor.

use apiserver::{route, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::setting::DelaySettings;
use std::sync::Arc;
use tower::ServiceExt;

pub const AUTH_HEADER: &str = "AWS4-HMAC-SHA256 \
     Credential=test/20130524/us-east-1/ec2/aws4_request, \
     SignedHeaders=host, Signature=deadbeef";

/// Lifecycle latencies shrunk so tests finish quickly; the removal delay
/// stays the longest, as in the real defaults.
pub fn fast_delays() -> DelaySettings {
    DelaySettings {
        vpc_available_ms: 40,
        subnet_available_ms: 30,
        instance_transition_ms: 40,
        volume_transition_ms: 30,
        db_instance_transition_ms: 40,
        termination_removal_ms: 150,
    }
}

pub fn test_app() -> Router {
    let state = AppState::new("us-east-1", &["test".to_string()], fast_delays());
    route::app(state)
}

/// POST an AWS form action through the full middleware stack.
pub async fn aws_post(app: &Router, form: &str) -> (StatusCode, String) {
    aws_post_scoped(app, form, "ec2").await
}

/// POST an AWS form action with a credential scope for the given service,
/// as the SDK client for that service would send it.
pub async fn aws_post_scoped(app: &Router, form: &str, service: &str) -> (StatusCode, String) {
    let auth = format!(
        "AWS4-HMAC-SHA256 Credential=test/20130524/us-east-1/{}/aws4_request, \
         SignedHeaders=host, Signature=deadbeef",
        service
    );
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("authorization", auth)
        .header("host", "localhost:4566")
        .body(Body::from(form.to_string()))
        .expect("request build");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// First `<tag>value</tag>` occurrence in an XML body.
pub fn xml_field(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].to_string())
}

/// Count of `<tag>` occurrences.
pub fn xml_count(body: &str, tag: &str) -> usize {
    body.matches(&format!("<{}>", tag)).count()
}

pub fn assert_hex_id(id: &str, prefix: &str, len: usize) {
    let rest = id
        .strip_prefix(prefix)
        .unwrap_or_else(|| panic!("id {} missing prefix {}", id, prefix));
    assert_eq!(rest.len(), len, "unexpected id width: {}", id);
    assert!(
        rest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
        "id {} is not lowercase hex",
        id
    );
}

pub async fn settle(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

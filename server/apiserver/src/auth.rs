/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! SigV4 admission middleware.
//!
//! A development emulator gains nothing from verifying signatures, and
//! full SigV4 is brittle across SDK generations. Admission checks the
//! header shape and that the access key is registered, then stamps the
//! service resolved from the credential scope into the request for the
//! router. Failures answer 403 `SignatureDoesNotMatch` in the XML
//! envelope, which every SDK understands.

use crate::errors::AwsError;
use crate::ids;
use crate::protocol::envelope::{render_error, WireResponse};
use crate::protocol::Protocol;
use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use std::sync::Arc;
use tracing::debug;

/// Paths that bypass admission. Entries ending in `/` are prefix
/// matches; the rest are exact.
const EXEMPT_PATHS: &[&str] = &["/_health", "/_services", "/latest/"];

/// Service hint stamped into request extensions for the router.
#[derive(Debug, Clone)]
pub struct ServiceHint(pub String);

/// Parsed pieces of a SigV4 `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigV4Parts {
    pub access_key: String,
    pub date: String,
    pub region: String,
    pub service: String,
    pub signed_headers: Vec<String>,
    pub signature: String,
}

/// Parse `AWS4-HMAC-SHA256 Credential=key/date/region/service/aws4_request,
/// SignedHeaders=a;b, Signature=hex`. Returns `None` on any shape defect.
pub fn parse_sigv4(header: &str) -> Option<SigV4Parts> {
    let rest = header.strip_prefix("AWS4-HMAC-SHA256")?.trim();

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;
    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let scope: Vec<&str> = credential?.split('/').collect();
    let [access_key, date, region, service, terminator] = scope.as_slice() else {
        return None;
    };
    if *terminator != "aws4_request" || access_key.is_empty() {
        return None;
    }

    Some(SigV4Parts {
        access_key: access_key.to_string(),
        date: date.to_string(),
        region: region.to_string(),
        service: service.to_string(),
        signed_headers: signed_headers?
            .split(';')
            .map(str::to_string)
            .collect(),
        signature: signature?.to_string(),
    })
}

/// Internal service identifier for a credential-scope short name.
pub fn map_service(short: &str) -> String {
    match short {
        "monitoring" => "cloudwatch".to_string(),
        "es" => "elasticsearch".to_string(),
        other => other.to_string(),
    }
}

fn exempt(method: &Method, path: &str) -> bool {
    if method == Method::GET && path == "/" {
        return true;
    }
    EXEMPT_PATHS.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('/') {
            path == prefix || path.starts_with(pattern)
        } else {
            path == *pattern
        }
    })
}

fn reject() -> Response<Body> {
    let err = AwsError::signature_mismatch();
    let wire: WireResponse = render_error(Protocol::Query, &err, &ids::request_id());
    (
        wire.status,
        [(header::CONTENT_TYPE, wire.content_type)],
        wire.body,
    )
        .into_response()
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let path = req.uri().path().to_string();
    if exempt(req.method(), &path) {
        return next.run(req).await;
    }

    let Some(auth_header) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        debug!(path, "rejecting request without authorization header");
        return reject();
    };

    let Some(parts) = parse_sigv4(auth_header) else {
        debug!(path, "rejecting malformed sigv4 header");
        return reject();
    };
    if !state.access_keys.contains(&parts.access_key) {
        debug!(path, access_key = parts.access_key, "unknown access key");
        return reject();
    }

    req.extensions_mut()
        .insert(ServiceHint(map_service(&parts.service)));
    next.run(req).await
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "AWS4-HMAC-SHA256 Credential=test/20130524/us-east-1/ec2/aws4_request, \
                          SignedHeaders=host;x-amz-date, Signature=deadbeef";

    #[test]
    fn test_parse_sigv4_happy_path() {
        let parts = parse_sigv4(HEADER).unwrap();
        assert_eq!(parts.access_key, "test");
        assert_eq!(parts.date, "20130524");
        assert_eq!(parts.region, "us-east-1");
        assert_eq!(parts.service, "ec2");
        assert_eq!(parts.signed_headers, vec!["host", "x-amz-date"]);
        assert_eq!(parts.signature, "deadbeef");
    }

    #[test]
    fn test_parse_sigv4_rejects_wrong_prefix() {
        assert!(parse_sigv4("AWS3 Credential=test/a/b/c/aws4_request").is_none());
    }

    #[test]
    fn test_parse_sigv4_rejects_short_scope() {
        assert!(parse_sigv4(
            "AWS4-HMAC-SHA256 Credential=test/us-east-1/ec2/aws4_request, \
             SignedHeaders=host, Signature=x"
        )
        .is_none());
    }

    #[test]
    fn test_parse_sigv4_rejects_missing_signature() {
        assert!(parse_sigv4(
            "AWS4-HMAC-SHA256 Credential=test/20130524/us-east-1/ec2/aws4_request, \
             SignedHeaders=host"
        )
        .is_none());
    }

    #[test]
    fn test_exempt_paths() {
        assert!(exempt(&Method::GET, "/_health"));
        assert!(exempt(&Method::GET, "/_services"));
        assert!(exempt(&Method::GET, "/latest/meta-data/instance-id"));
        assert!(exempt(&Method::GET, "/"));
        assert!(!exempt(&Method::POST, "/"));
        assert!(!exempt(&Method::GET, "/_healthcheck"));
        assert!(!exempt(&Method::POST, "/anything"));
    }

    #[test]
    fn test_map_service() {
        assert_eq!(map_service("ec2"), "ec2");
        assert_eq!(map_service("monitoring"), "cloudwatch");
    }
}

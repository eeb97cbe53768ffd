/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! HTTP façade: operational endpoints plus the catch-all AWS dispatch.
//!
//! The catch-all normalizes each request into the internal form — body
//! read once into bytes, headers flattened first-value-wins, query
//! string preserved — then runs auth → router → service. The root path
//! serves a status document unless the host is an S3 virtual-hosted
//! bucket, in which case it forwards into dispatch like any other
//! service request.

use crate::auth::{auth_middleware, ServiceHint};
use crate::ids;
use crate::protocol::envelope::{render_error, WireResponse};
use crate::protocol::{AwsRequest, Protocol};
use crate::router;
use crate::AppState;
use axum::body::{to_bytes, Body};
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use axum::Router;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Build the emulator router with all endpoints and middleware.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/_health", get(health))
        .route("/_services", get(list_services))
        .route("/latest/*path", get(instance_metadata).put(imds_token))
        .route("/", any(root))
        .fallback(dispatch)
        .with_state(Arc::clone(&state))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn wire(resp: WireResponse) -> Response {
    let mut builder = Response::builder()
        .status(resp.status)
        .header(header::CONTENT_TYPE, resp.content_type);
    if let Some(error_type) = &resp.error_type {
        builder = builder.header("x-amzn-ErrorType", error_type);
    }
    builder
        .body(Body::from(resp.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Read the request into the normalized internal form. The body is read
/// exactly once; headers flatten with first-value-wins.
async fn normalize(req: Request<Body>) -> AwsRequest {
    let (parts, body) = req.into_parts();

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        let key = name.as_str().to_ascii_lowercase();
        if let Ok(text) = value.to_str() {
            headers.entry(key).or_insert_with(|| text.to_string());
        }
    }

    let service_hint = parts
        .extensions
        .get::<ServiceHint>()
        .map(|hint| hint.0.clone());

    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    AwsRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        headers,
        body,
        service_hint,
    }
}

async fn dispatch_request(state: &AppState, req: AwsRequest) -> Response {
    match router::resolve(state, &req) {
        Ok(service) => {
            debug!(
                service = service.service_name(),
                action = req.action().as_deref().unwrap_or(""),
                "dispatching request"
            );
            wire(service.handle_request(&req).await)
        }
        Err(err) => {
            // No service identity: pick the envelope by request heuristics.
            let protocol = if req.target().is_some() {
                Protocol::Json
            } else {
                Protocol::Query
            };
            wire(render_error(protocol, &err, &ids::request_id()))
        }
    }
}

/// Catch-all AWS service dispatch.
async fn dispatch(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let aws_req = normalize(req).await;
    dispatch_request(&state, aws_req).await
}

/// `/` — root status for plain GETs; everything else (service POSTs,
/// S3 virtual-hosted requests) flows into dispatch.
async fn root(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if req.method() == axum::http::Method::GET && !router::is_s3_virtual_host(host) {
        return Json(json!({
            "status": "running",
            "service": "mirage",
            "services": state.services.iter().map(|s| s.service_name()).collect::<Vec<_>>()
        }))
        .into_response();
    }

    let aws_req = normalize(req).await;
    dispatch_request(&state, aws_req).await
}

async fn health() -> Response {
    let mut body = json!({
        "status": "ok",
        "service": "mirage-apiserver"
    });
    if let Some(sha) = option_env!("GIT_COMMIT_SHA") {
        body["git_commit_sha"] = json!(sha);
    }
    Json(body).into_response()
}

async fn list_services(State(state): State<Arc<AppState>>) -> Response {
    let names: Vec<&str> = state.services.iter().map(|s| s.service_name()).collect();
    Json(json!({ "services": names, "count": names.len() })).into_response()
}

/// Instance-metadata passthrough: the handful of documents SDK probes
/// actually read.
async fn instance_metadata(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Response {
    let zone = format!("{}a", state.region);
    let body: Option<String> = match path.trim_end_matches('/') {
        "meta-data" => Some(
            "ami-id\ninstance-id\ninstance-type\nlocal-ipv4\nplacement/".to_string(),
        ),
        "meta-data/instance-id" => Some("i-0123456789abcdef0".to_string()),
        "meta-data/instance-type" => Some("t2.micro".to_string()),
        "meta-data/ami-id" => Some("ami-0c55b159cbfafe1f0".to_string()),
        "meta-data/local-ipv4" => Some("172.31.0.4".to_string()),
        "meta-data/placement/availability-zone" => Some(zone),
        "dynamic/instance-identity/document" => Some(
            json!({
                "instanceId": "i-0123456789abcdef0",
                "imageId": "ami-0c55b159cbfafe1f0",
                "instanceType": "t2.micro",
                "region": state.region,
                "availabilityZone": format!("{}a", state.region)
            })
            .to_string(),
        ),
        _ => None,
    };

    match body {
        Some(text) => (StatusCode::OK, text).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// `PUT /latest/api/token` — IMDSv2 session token.
async fn imds_token(Path(path): Path<String>) -> Response {
    if path == "api/token" {
        (StatusCode::OK, "mirage-imds-token").into_response()
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, "").into_response()
    }
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! SigV4 admission through the full HTTP stack.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{aws_post, test_app, xml_field};
use tower::ServiceExt;

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn test_health_is_exempt() {
    let app = test_app();
    let req = Request::builder()
        .uri("/_health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["service"].is_string());
}

#[tokio::test]
async fn test_services_listing_is_exempt() {
    let app = test_app();
    let req = Request::builder()
        .uri("/_services")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["count"], 2);
}

#[tokio::test]
async fn test_instance_metadata_is_exempt() {
    let app = test_app();
    let req = Request::builder()
        .uri("/latest/meta-data/instance-id")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("i-"));
}

#[tokio::test]
async fn test_root_get_is_exempt_but_post_is_not() {
    let app = test_app();

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("Action=DescribeVpcs"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("SignatureDoesNotMatch")
    );
}

#[tokio::test]
async fn test_registered_key_reaches_service() {
    let app = test_app();
    let (status, body) = aws_post(&app, "Action=DescribeVpcs").await;
    assert_eq!(status, StatusCode::OK);
    // The EC2 envelope, not an error: data inline, requestId at the end.
    assert!(body.contains("<DescribeVpcsResponse>"));
    assert!(body.contains("<vpcSet>"));
    assert!(body.contains("<requestId>"));
}

#[tokio::test]
async fn test_unknown_access_key_is_rejected() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .header(
            "authorization",
            "AWS4-HMAC-SHA256 Credential=stranger/20130524/us-east-1/ec2/aws4_request, \
             SignedHeaders=host, Signature=deadbeef",
        )
        .body(Body::from("Action=DescribeVpcs"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("SignatureDoesNotMatch")
    );
}

#[tokio::test]
async fn test_malformed_authorization_is_rejected() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(Body::from("Action=DescribeVpcs"))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_credential_scope_routes_to_service() {
    let app = test_app();

    // The scope says rds; the action exists there. The router honors the
    // stamped hint without consulting the action table.
    let req = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .header(
            "authorization",
            "AWS4-HMAC-SHA256 Credential=test/20130524/us-east-1/rds/aws4_request, \
             SignedHeaders=host, Signature=deadbeef",
        )
        .body(Body::from("Action=DescribeDBInstances"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<DescribeDBInstancesResponse>"));
    assert!(body.contains("<DescribeDBInstancesResult>"));
}

#[tokio::test]
async fn test_unresolvable_service_is_invalid_service() {
    let app = test_app();

    // Signed for a service the emulator does not register, with an action
    // no registered service supports either.
    let req = Request::builder()
        .method("POST")
        .uri("/unknown-path")
        .header("content-type", "application/x-www-form-urlencoded")
        .header(
            "authorization",
            "AWS4-HMAC-SHA256 Credential=test/20130524/us-east-1/lambda/aws4_request, \
             SignedHeaders=host, Signature=deadbeef",
        )
        .body(Body::from("Action=TotallyUnknownAction"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(xml_field(&body, "Code").as_deref(), Some("InvalidService"));
}

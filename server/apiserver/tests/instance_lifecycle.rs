/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Instance lifecycle: run, stop, start, invalid start, terminate, and
//! the deferred record removal.

mod common;

use axum::http::StatusCode;
use common::{assert_hex_id, aws_post, settle, test_app, xml_field};

const RUN: &str = "Action=RunInstances&ImageId=ami-0c55b159cbfafe1f0\
                   &InstanceType=t2.micro&MinCount=1&MaxCount=1";

fn instance_state(body: &str) -> Option<String> {
    // First nested instanceState/name in the response.
    common::xml_field(body, "name")
}

#[tokio::test]
async fn test_instance_full_lifecycle() {
    let app = test_app();

    let (status, body) = aws_post(&app, RUN).await;
    assert_eq!(status, StatusCode::OK, "run failed: {}", body);
    let id = xml_field(&body, "instanceId").unwrap();
    assert_hex_id(&id, "i-", 17);
    assert_eq!(instance_state(&body).as_deref(), Some("pending"));

    // pending -> running after the transition delay.
    settle(120).await;
    let (_, body) = aws_post(&app, &format!("Action=DescribeInstances&InstanceId.1={}", id)).await;
    assert_eq!(instance_state(&body).as_deref(), Some("running"));

    // Stop: immediate stopping, scheduled stopped.
    let (status, body) = aws_post(&app, &format!("Action=StopInstances&InstanceId.1={}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<name>stopping</name>"));
    settle(120).await;
    let (_, body) = aws_post(&app, &format!("Action=DescribeInstances&InstanceId.1={}", id)).await;
    assert_eq!(instance_state(&body).as_deref(), Some("stopped"));

    // Start from stopped returns the instance to running.
    let (status, _) = aws_post(&app, &format!("Action=StartInstances&InstanceId.1={}", id)).await;
    assert_eq!(status, StatusCode::OK);
    settle(120).await;
    let (_, body) = aws_post(&app, &format!("Action=DescribeInstances&InstanceId.1={}", id)).await;
    assert_eq!(instance_state(&body).as_deref(), Some("running"));

    // Start while running is rejected.
    let (status, body) =
        aws_post(&app, &format!("Action=StartInstances&InstanceId.1={}", id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("IncorrectInstanceState")
    );

    // Terminate: shutting-down now, terminated soon, removed later.
    let (status, body) =
        aws_post(&app, &format!("Action=TerminateInstances&InstanceId.1={}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<name>shutting-down</name>"));

    settle(120).await;
    let (_, body) = aws_post(&app, &format!("Action=DescribeInstances&InstanceId.1={}", id)).await;
    assert_eq!(instance_state(&body).as_deref(), Some("terminated"));

    // The record vanishes after the longer removal delay.
    settle(200).await;
    let (status, body) =
        aws_post(&app, &format!("Action=DescribeInstances&InstanceId.1={}", id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("InvalidInstanceID.NotFound")
    );
}

#[tokio::test]
async fn test_run_instances_validates_references() {
    let app = test_app();

    let (status, body) = aws_post(
        &app,
        "Action=RunInstances&ImageId=ami-ffffffffffffffff\
         &InstanceType=t2.micro&MinCount=1&MaxCount=1",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("InvalidAMIID.NotFound")
    );

    let (status, body) = aws_post(
        &app,
        "Action=RunInstances&ImageId=ami-0c55b159cbfafe1f0\
         &InstanceType=z9.gigantic&MinCount=1&MaxCount=1",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("InvalidParameterValue")
    );
}

#[tokio::test]
async fn test_instance_lands_in_default_subnet_and_group() {
    let app = test_app();

    let (_, body) = aws_post(&app, RUN).await;
    let id = xml_field(&body, "instanceId").unwrap();

    let (_, body) = aws_post(&app, &format!("Action=DescribeInstances&InstanceId.1={}", id)).await;
    assert_eq!(
        xml_field(&body, "subnetId").as_deref(),
        Some("subnet-default")
    );
    assert_eq!(xml_field(&body, "groupId").as_deref(), Some("sg-default"));

    // The default subnet now blocks deletion attempts against it.
    let (status, body) =
        aws_post(&app, "Action=DeleteSubnet&SubnetId=subnet-default").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        xml_field(&body, "Code").as_deref(),
        Some("DependencyViolation")
    );
    assert!(xml_field(&body, "Message").unwrap().contains(&id));
}

#[tokio::test]
async fn test_describe_instance_credit_specifications() {
    let app = test_app();

    let (_, body) = aws_post(&app, RUN).await;
    let id = xml_field(&body, "instanceId").unwrap();

    let (status, body) = aws_post(
        &app,
        &format!(
            "Action=DescribeInstanceCreditSpecifications&InstanceId.1={}",
            id
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<cpuCredits>standard</cpuCredits>"));
}

#[tokio::test]
async fn test_volume_attach_requires_running_instance() {
    let app = test_app();

    let (_, body) = aws_post(&app, RUN).await;
    let instance_id = xml_field(&body, "instanceId").unwrap();

    let (_, body) = aws_post(
        &app,
        "Action=CreateVolume&AvailabilityZone=us-east-1a&Size=8",
    )
    .await;
    let volume_id = xml_field(&body, "volumeId").unwrap();
    assert_hex_id(&volume_id, "vol-", 8);

    // Both sides still transitional: attach is refused.
    let (status, _) = aws_post(
        &app,
        &format!(
            "Action=AttachVolume&VolumeId={}&InstanceId={}&Device=%2Fdev%2Fsdf",
            volume_id, instance_id
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    settle(120).await;
    let (status, body) = aws_post(
        &app,
        &format!(
            "Action=AttachVolume&VolumeId={}&InstanceId={}&Device=%2Fdev%2Fsdf",
            volume_id, instance_id
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "attach failed: {}", body);
    assert_eq!(xml_field(&body, "status").as_deref(), Some("attached"));

    let (_, body) = aws_post(
        &app,
        &format!("Action=DescribeVolumes&VolumeId.1={}", volume_id),
    )
    .await;
    assert_eq!(xml_field(&body, "state").as_deref(), Some("in-use"));

    // In-use volumes cannot be deleted.
    let (status, body) = aws_post(
        &app,
        &format!("Action=DeleteVolume&VolumeId={}", volume_id),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(xml_field(&body, "Code").as_deref(), Some("VolumeInUse"));

    let (status, _) = aws_post(
        &app,
        &format!("Action=DetachVolume&VolumeId={}", volume_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = aws_post(
        &app,
        &format!("Action=DeleteVolume&VolumeId={}", volume_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

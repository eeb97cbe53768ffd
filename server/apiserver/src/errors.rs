/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The wire-facing error taxonomy.
//!
//! Handlers translate every internal failure into an `AwsError` carrying
//! the AWS code string and HTTP status the calling SDK matches on; the
//! protocol layer renders it in the envelope of the resolved protocol.
//! Nothing below the HTTP layer produces an uncontrolled 5xx.

use axum::http::StatusCode;
use common::StoreError;
use resourcemanager::{GraphError, NodeId, ResourceError};
use statemanager::StateTransitionError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct AwsError {
    pub code: String,
    pub message: String,
    pub status: StatusCode,
}

impl AwsError {
    pub fn new(code: &str, message: impl Into<String>, status: StatusCode) -> Self {
        AwsError {
            code: code.to_string(),
            message: message.into(),
            status,
        }
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            "MissingParameter",
            format!("The request must contain the parameter {}", name),
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn invalid_parameter_value(name: &str, value: &str) -> Self {
        Self::new(
            "InvalidParameterValue",
            format!("Value ({}) for parameter {} is invalid", value, name),
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn invalid_action(action: &str) -> Self {
        Self::new(
            "InvalidAction",
            format!("The action {} is not valid for this web service", action),
            StatusCode::BAD_REQUEST,
        )
    }

    /// Kind-specific not-found; EC2 answers 400, RDS 404 (the latter is
    /// what Terraform's delete waiter polls for).
    pub fn not_found(code: &str, message: impl Into<String>, status: StatusCode) -> Self {
        Self::new(code, message, status)
    }

    pub fn conflict(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::CONFLICT)
    }

    pub fn incorrect_state(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::BAD_REQUEST)
    }

    pub fn dependency_violation(id: &str, blockers: &[NodeId]) -> Self {
        let names: Vec<String> = blockers.iter().map(|b| b.id.clone()).collect();
        Self::new(
            "DependencyViolation",
            format!(
                "resource {} has a dependent object: {}",
                id,
                names.join(", ")
            ),
            StatusCode::BAD_REQUEST,
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("ValidationException", message, StatusCode::BAD_REQUEST)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            "InternalFailure",
            message,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    pub fn signature_mismatch() -> Self {
        Self::new(
            "SignatureDoesNotMatch",
            "The request signature we calculated does not match the signature you provided. \
             Check your AWS Secret Access Key and signing method.",
            StatusCode::FORBIDDEN,
        )
    }

    pub fn invalid_service(message: impl Into<String>) -> Self {
        Self::new("InvalidService", message, StatusCode::BAD_REQUEST)
    }
}

impl From<StoreError> for AwsError {
    fn from(err: StoreError) -> Self {
        // Store misses are mapped to kind-specific codes at the call
        // sites that know the kind; anything reaching this conversion is
        // unexpected.
        AwsError::internal(err.to_string())
    }
}

impl From<GraphError> for AwsError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DependencyViolation { id, blockers } => {
                AwsError::dependency_violation(&id.id, &blockers)
            }
            GraphError::Validation { .. } | GraphError::Cycle { .. } => {
                AwsError::validation(err.to_string())
            }
            other => AwsError::internal(other.to_string()),
        }
    }
}

impl From<ResourceError> for AwsError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Graph(graph) => graph.into(),
            other => AwsError::internal(other.to_string()),
        }
    }
}

impl From<StateTransitionError> for AwsError {
    fn from(err: StateTransitionError) -> Self {
        AwsError::incorrect_state("IncorrectState", err.to_string())
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_violation_lists_blockers() {
        let blockers = vec![
            NodeId::new("ec2", "subnets", "subnet-1"),
            NodeId::new("ec2", "subnets", "subnet-2"),
        ];
        let err = AwsError::dependency_violation("vpc-1", &blockers);
        assert_eq!(err.code, "DependencyViolation");
        assert!(err.message.contains("subnet-1"));
        assert!(err.message.contains("subnet-2"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_graph_errors_map_to_wire_codes() {
        let err: AwsError = GraphError::DependencyViolation {
            id: NodeId::new("ec2", "vpcs", "vpc-1"),
            blockers: vec![NodeId::new("ec2", "subnets", "subnet-1")],
        }
        .into();
        assert_eq!(err.code, "DependencyViolation");

        let err: AwsError = GraphError::Validation {
            from_kind: "a".into(),
            to_kind: "b".into(),
            edge_type: resourcemanager::EdgeType::Uses,
        }
        .into();
        assert_eq!(err.code, "ValidationException");
    }

    #[test]
    fn test_signature_mismatch_is_403() {
        assert_eq!(AwsError::signature_mismatch().status, StatusCode::FORBIDDEN);
    }
}

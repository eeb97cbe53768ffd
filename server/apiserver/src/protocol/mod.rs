/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS request protocols: recognition and the normalized request form.

pub mod envelope;
pub mod params;

use bytes::Bytes;
use std::collections::HashMap;

/// The wire protocols the emulator speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Query-like, responses without the `Result` wrapper (EC2).
    Ec2,
    /// Form-encoded request, `<ActionResponse><ActionResult>` XML (RDS, STS).
    Query,
    /// `X-Amz-Target` JSON request/response (DynamoDB-like).
    Json,
    /// S3-style REST with XML bodies.
    RestXml,
}

/// Envelope used by a known service identity.
///
/// Chosen by service, not by inspecting outgoing data, so error paths that
/// never produce a normal body still pick the right format.
pub fn for_service(name: &str) -> Protocol {
    match name {
        "ec2" => Protocol::Ec2,
        "s3" => Protocol::RestXml,
        "dynamodb" => Protocol::Json,
        _ => Protocol::Query,
    }
}

/// A request normalized out of the HTTP layer: body read once, headers
/// flattened lowercase first-value-wins, query preserved verbatim.
#[derive(Debug, Clone, Default)]
pub struct AwsRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// Service identifier pre-resolved from the SigV4 credential scope.
    pub service_hint: Option<String>,
}

impl AwsRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn target(&self) -> Option<&str> {
        self.header("x-amz-target")
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    /// Detect the request protocol by heuristics. Any `X-Amz-Target`
    /// header implies the JSON protocol.
    pub fn protocol(&self) -> Protocol {
        let content_type = self.header("content-type").unwrap_or_default();
        if self.target().is_some() || content_type.starts_with("application/x-amz-json") {
            Protocol::Json
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            Protocol::Query
        } else {
            Protocol::RestXml
        }
    }

    /// Query-string parameters, percent-decoded.
    pub fn query_params(&self) -> HashMap<String, String> {
        params::parse_urlencoded(&self.query)
    }

    /// Form-body parameters, percent-decoded. Empty for non-form bodies.
    pub fn form_params(&self) -> HashMap<String, String> {
        let content_type = self.header("content-type").unwrap_or_default();
        if !content_type.starts_with("application/x-www-form-urlencoded") {
            return HashMap::new();
        }
        match std::str::from_utf8(&self.body) {
            Ok(text) => params::parse_urlencoded(text),
            Err(_) => HashMap::new(),
        }
    }

    /// All request parameters: form fields layered over query fields.
    pub fn params(&self) -> HashMap<String, String> {
        let mut merged = self.query_params();
        merged.extend(self.form_params());
        merged
    }

    /// The AWS action: `X-Amz-Target` tail, then the URL `Action` query
    /// parameter, then the form `Action` field.
    pub fn action(&self) -> Option<String> {
        if let Some(target) = self.target() {
            let tail = target.rsplit('.').next().unwrap_or(target);
            return Some(tail.to_string());
        }
        if let Some(action) = self.query_params().get("Action") {
            return Some(action.clone());
        }
        self.form_params().get("Action").cloned()
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_action_from_form_body() {
        let req = form_request("Action=CreateVpc&CidrBlock=10.0.0.0%2F16");
        assert_eq!(req.action().as_deref(), Some("CreateVpc"));
        assert_eq!(
            req.params().get("CidrBlock").map(String::as_str),
            Some("10.0.0.0/16")
        );
        assert_eq!(req.protocol(), Protocol::Query);
    }

    #[test]
    fn test_action_from_target_header() {
        let mut req = AwsRequest::default();
        req.headers.insert(
            "x-amz-target".to_string(),
            "DynamoDB_20120810.ListTables".to_string(),
        );
        assert_eq!(req.action().as_deref(), Some("ListTables"));
        assert_eq!(req.protocol(), Protocol::Json);
    }

    #[test]
    fn test_action_from_url_query() {
        let req = AwsRequest {
            query: "Action=DescribeVpcs&Version=2016-11-15".into(),
            ..Default::default()
        };
        assert_eq!(req.action().as_deref(), Some("DescribeVpcs"));
    }

    #[test]
    fn test_amz_json_content_type_is_json_protocol() {
        let mut req = AwsRequest::default();
        req.headers.insert(
            "content-type".to_string(),
            "application/x-amz-json-1.0".to_string(),
        );
        assert_eq!(req.protocol(), Protocol::Json);
    }

    #[test]
    fn test_envelope_for_service_identity() {
        assert_eq!(for_service("ec2"), Protocol::Ec2);
        assert_eq!(for_service("rds"), Protocol::Query);
        assert_eq!(for_service("s3"), Protocol::RestXml);
        assert_eq!(for_service("sts"), Protocol::Query);
    }
}

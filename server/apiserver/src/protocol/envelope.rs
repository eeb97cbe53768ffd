/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Response envelope construction for the Query, EC2, and JSON protocols.
//!
//! Handlers produce plain JSON trees; the writers here wrap them in the
//! envelope the calling SDK expects. Arrays render as repeated elements
//! named after their key, so `{"vpcSet": {"item": [...]}}` becomes
//! `<vpcSet><item>…</item><item>…</item></vpcSet>` and RDS-style
//! `{"DBInstances": {"DBInstance": [...]}}` keeps its member naming.

use crate::errors::AwsError;
use crate::protocol::Protocol;
use axum::http::StatusCode;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;
use tracing::warn;

/// A fully rendered protocol response, ready for the HTTP layer.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    /// `x-amzn-ErrorType` for JSON-protocol errors.
    pub error_type: Option<String>,
    pub body: String,
}

const TEXT_XML: &str = "text/xml";
const AMZ_JSON: &str = "application/x-amz-json-1.0";

type XmlResult = Result<(), quick_xml::Error>;

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_element(w: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> XmlResult {
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(w, name, item)?;
            }
        }
        Value::Object(map) => {
            w.write_event(Event::Start(BytesStart::new(name)))?;
            for (key, child) in map {
                write_element(w, key, child)?;
            }
            w.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Value::Null => {
            w.write_event(Event::Empty(BytesStart::new(name)))?;
        }
        scalar => {
            w.write_event(Event::Start(BytesStart::new(name)))?;
            w.write_event(Event::Text(BytesText::new(&scalar_text(scalar))))?;
            w.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }
    Ok(())
}

fn write_text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> XmlResult {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn finish(writer: Writer<Vec<u8>>) -> String {
    String::from_utf8(writer.into_inner()).unwrap_or_default()
}

fn render_xml<F>(build: F) -> String
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> XmlResult,
{
    let mut writer = Writer::new(Vec::new());
    if let Err(e) = build(&mut writer) {
        warn!(error = %e, "xml envelope rendering failed");
        return String::new();
    }
    finish(writer)
}

/// Query protocol: `<ActionResponse><ActionResult>…</ActionResult>
/// <ResponseMetadata><RequestId/></ResponseMetadata></ActionResponse>`.
pub fn query_response(action: &str, data: &Value, request_id: &str) -> String {
    let response = format!("{}Response", action);
    let result = format!("{}Result", action);
    render_xml(|w| {
        w.write_event(Event::Start(BytesStart::new(response.as_str())))?;
        w.write_event(Event::Start(BytesStart::new(result.as_str())))?;
        if let Value::Object(map) = data {
            for (key, child) in map {
                write_element(w, key, child)?;
            }
        }
        w.write_event(Event::End(BytesEnd::new(result.as_str())))?;
        w.write_event(Event::Start(BytesStart::new("ResponseMetadata")))?;
        write_text_element(w, "RequestId", request_id)?;
        w.write_event(Event::End(BytesEnd::new("ResponseMetadata")))?;
        w.write_event(Event::End(BytesEnd::new(response.as_str())))?;
        Ok(())
    })
}

/// EC2 protocol: as Query but without the `Result` wrapper; data inlined
/// in the response element with the request id at the end.
pub fn ec2_response(action: &str, data: &Value, request_id: &str) -> String {
    let response = format!("{}Response", action);
    render_xml(|w| {
        w.write_event(Event::Start(BytesStart::new(response.as_str())))?;
        if let Value::Object(map) = data {
            for (key, child) in map {
                write_element(w, key, child)?;
            }
        }
        write_text_element(w, "requestId", request_id)?;
        w.write_event(Event::End(BytesEnd::new(response.as_str())))?;
        Ok(())
    })
}

/// Query/REST-XML error envelope.
pub fn query_error(code: &str, message: &str, request_id: &str) -> String {
    render_xml(|w| {
        w.write_event(Event::Start(BytesStart::new("ErrorResponse")))?;
        w.write_event(Event::Start(BytesStart::new("Error")))?;
        write_text_element(w, "Code", code)?;
        write_text_element(w, "Message", message)?;
        w.write_event(Event::End(BytesEnd::new("Error")))?;
        write_text_element(w, "RequestId", request_id)?;
        w.write_event(Event::End(BytesEnd::new("ErrorResponse")))?;
        Ok(())
    })
}

/// EC2 error envelope, with its `<Errors>` list and `RequestID` casing.
pub fn ec2_error(code: &str, message: &str, request_id: &str) -> String {
    render_xml(|w| {
        w.write_event(Event::Start(BytesStart::new("Response")))?;
        w.write_event(Event::Start(BytesStart::new("Errors")))?;
        w.write_event(Event::Start(BytesStart::new("Error")))?;
        write_text_element(w, "Code", code)?;
        write_text_element(w, "Message", message)?;
        w.write_event(Event::End(BytesEnd::new("Error")))?;
        w.write_event(Event::End(BytesEnd::new("Errors")))?;
        write_text_element(w, "RequestID", request_id)?;
        w.write_event(Event::End(BytesEnd::new("Response")))?;
        Ok(())
    })
}

/// Render a successful action result in the protocol's envelope.
pub fn render_success(
    protocol: Protocol,
    action: &str,
    data: &Value,
    request_id: &str,
) -> WireResponse {
    match protocol {
        Protocol::Ec2 => WireResponse {
            status: StatusCode::OK,
            content_type: TEXT_XML,
            error_type: None,
            body: ec2_response(action, data, request_id),
        },
        Protocol::Query | Protocol::RestXml => WireResponse {
            status: StatusCode::OK,
            content_type: TEXT_XML,
            error_type: None,
            body: query_response(action, data, request_id),
        },
        Protocol::Json => WireResponse {
            status: StatusCode::OK,
            content_type: AMZ_JSON,
            error_type: None,
            body: data.to_string(),
        },
    }
}

/// Render an error in the protocol's envelope, carrying the HTTP status
/// the error prescribes.
pub fn render_error(protocol: Protocol, err: &AwsError, request_id: &str) -> WireResponse {
    match protocol {
        Protocol::Ec2 => WireResponse {
            status: err.status,
            content_type: TEXT_XML,
            error_type: None,
            body: ec2_error(&err.code, &err.message, request_id),
        },
        Protocol::Query | Protocol::RestXml => WireResponse {
            status: err.status,
            content_type: TEXT_XML,
            error_type: None,
            body: query_error(&err.code, &err.message, request_id),
        },
        Protocol::Json => WireResponse {
            status: err.status,
            content_type: AMZ_JSON,
            error_type: Some(err.code.clone()),
            body: serde_json::json!({ "__type": err.code, "message": err.message }).to_string(),
        },
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_envelope_shape() {
        let data = json!({ "DBInstance": { "DBInstanceIdentifier": "db1" } });
        let xml = query_response("CreateDBInstance", &data, "req-1");
        assert!(xml.starts_with("<CreateDBInstanceResponse>"));
        assert!(xml.contains("<CreateDBInstanceResult>"));
        assert!(xml.contains("<DBInstanceIdentifier>db1</DBInstanceIdentifier>"));
        assert!(xml.contains("<ResponseMetadata><RequestId>req-1</RequestId></ResponseMetadata>"));
        assert!(xml.ends_with("</CreateDBInstanceResponse>"));
    }

    #[test]
    fn test_ec2_envelope_has_no_result_wrapper() {
        let data = json!({ "vpc": { "vpcId": "vpc-1", "state": "pending" } });
        let xml = ec2_response("CreateVpc", &data, "req-1");
        assert!(xml.starts_with("<CreateVpcResponse>"));
        assert!(!xml.contains("Result"));
        assert!(xml.contains("<vpcId>vpc-1</vpcId>"));
        // Request id sits at the end of the response element.
        assert!(xml.ends_with("<requestId>req-1</requestId></CreateVpcResponse>"));
    }

    #[test]
    fn test_array_renders_repeated_elements() {
        let data = json!({ "vpcSet": { "item": [
            { "vpcId": "vpc-1" },
            { "vpcId": "vpc-2" }
        ]}});
        let xml = ec2_response("DescribeVpcs", &data, "r");
        let items = xml.matches("<item>").count();
        assert_eq!(items, 2);
        assert!(xml.contains("<vpcSet><item><vpcId>vpc-1</vpcId></item>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let data = json!({ "value": "a<b&c" });
        let xml = ec2_response("DescribeTags", &data, "r");
        assert!(xml.contains("<value>a&lt;b&amp;c</value>"));
    }

    #[test]
    fn test_query_error_envelope() {
        let xml = query_error("DBInstanceNotFound", "db1 not found", "req-9");
        assert!(xml.starts_with("<ErrorResponse><Error>"));
        assert!(xml.contains("<Code>DBInstanceNotFound</Code>"));
        assert!(xml.contains("<Message>db1 not found</Message>"));
        assert!(xml.ends_with("<RequestId>req-9</RequestId></ErrorResponse>"));
    }

    #[test]
    fn test_ec2_error_envelope() {
        let xml = ec2_error("InvalidVpcID.NotFound", "vpc-1 does not exist", "req-9");
        assert!(xml.starts_with("<Response><Errors><Error>"));
        assert!(xml.contains("<Code>InvalidVpcID.NotFound</Code>"));
        assert!(xml.contains("<RequestID>req-9</RequestID>"));
    }

    #[test]
    fn test_json_error_carries_type_header() {
        let err = AwsError::validation("bad input");
        let resp = render_error(Protocol::Json, &err, "r");
        assert_eq!(resp.error_type.as_deref(), Some("ValidationException"));
        let body: Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body["__type"], "ValidationException");
    }
}

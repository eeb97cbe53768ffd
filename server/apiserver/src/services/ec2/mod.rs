/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The EC2 service: VPCs, subnets, security groups, gateways, volumes,
//! key pairs, launch templates, tags, and the instance lifecycle.

pub mod defaults;
pub mod describe;
pub mod instance;
pub mod internet_gateway;
pub mod key_pair;
pub mod launch_template;
pub mod security_group;
pub mod subnet;
pub mod tags;
pub mod volume;
pub mod vpc;

use crate::errors::AwsError;
use crate::ids;
use crate::protocol::envelope::WireResponse;
use crate::protocol::{params as p, AwsRequest};
use crate::services::{self, AwsService};
use async_trait::async_trait;
use axum::http::StatusCode;
use common::setting::DelaySettings;
use resourcemanager::{NodeId, ResourceManager};
use serde_json::{json, Map, Value};
use statemanager::StateMachineManager;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const SERVICE: &str = "ec2";
pub(crate) const OWNER_ID: &str = "123456789012";

const ACTIONS: &[&str] = &[
    "CreateVpc",
    "DescribeVpcs",
    "DeleteVpc",
    "CreateSubnet",
    "DescribeSubnets",
    "DeleteSubnet",
    "CreateSecurityGroup",
    "DescribeSecurityGroups",
    "DeleteSecurityGroup",
    "AuthorizeSecurityGroupIngress",
    "AuthorizeSecurityGroupEgress",
    "RevokeSecurityGroupIngress",
    "RevokeSecurityGroupEgress",
    "DescribeSecurityGroupRules",
    "CreateInternetGateway",
    "AttachInternetGateway",
    "DetachInternetGateway",
    "DeleteInternetGateway",
    "DescribeInternetGateways",
    "DescribeImages",
    "CreateVolume",
    "DescribeVolumes",
    "DeleteVolume",
    "AttachVolume",
    "DetachVolume",
    "CreateKeyPair",
    "ImportKeyPair",
    "DescribeKeyPairs",
    "DeleteKeyPair",
    "CreateLaunchTemplate",
    "DescribeLaunchTemplates",
    "DeleteLaunchTemplate",
    "CreateTags",
    "DeleteTags",
    "DescribeTags",
    "DescribeNetworkInterfaces",
    "DescribeNetworkAcls",
    "DescribeRouteTables",
    "RunInstances",
    "DescribeInstances",
    "StartInstances",
    "StopInstances",
    "TerminateInstances",
    "DescribeInstanceTypes",
    "DescribeInstanceAttribute",
    "DescribeInstanceCreditSpecifications",
];

pub struct Ec2Service {
    pub(crate) resources: Arc<ResourceManager>,
    pub(crate) states: Arc<StateMachineManager>,
    pub(crate) region: String,
    pub(crate) delays: DelaySettings,
}

#[async_trait]
impl AwsService for Ec2Service {
    fn service_name(&self) -> &'static str {
        SERVICE
    }

    fn supported_actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    async fn handle_request(&self, req: &AwsRequest) -> WireResponse {
        services::dispatch(SERVICE, req, |action| async move {
            let params = req.params();
            match action.as_str() {
                "CreateVpc" => vpc::create_vpc(self, &params).await,
                "DescribeVpcs" => vpc::describe_vpcs(self, &params),
                "DeleteVpc" => vpc::delete_vpc(self, &params).await,
                "CreateSubnet" => subnet::create_subnet(self, &params).await,
                "DescribeSubnets" => subnet::describe_subnets(self, &params),
                "DeleteSubnet" => subnet::delete_subnet(self, &params).await,
                "CreateSecurityGroup" => security_group::create_security_group(self, &params),
                "DescribeSecurityGroups" => {
                    security_group::describe_security_groups(self, &params)
                }
                "DeleteSecurityGroup" => {
                    security_group::delete_security_group(self, &params).await
                }
                "AuthorizeSecurityGroupIngress" => {
                    security_group::authorize(self, &params, false).await
                }
                "AuthorizeSecurityGroupEgress" => {
                    security_group::authorize(self, &params, true).await
                }
                "RevokeSecurityGroupIngress" => {
                    security_group::revoke(self, &params, false).await
                }
                "RevokeSecurityGroupEgress" => security_group::revoke(self, &params, true).await,
                "DescribeSecurityGroupRules" => {
                    security_group::describe_security_group_rules(self, &params)
                }
                "CreateInternetGateway" => {
                    internet_gateway::create_internet_gateway(self, &params)
                }
                "AttachInternetGateway" => {
                    internet_gateway::attach_internet_gateway(self, &params).await
                }
                "DetachInternetGateway" => {
                    internet_gateway::detach_internet_gateway(self, &params).await
                }
                "DeleteInternetGateway" => {
                    internet_gateway::delete_internet_gateway(self, &params).await
                }
                "DescribeInternetGateways" => {
                    internet_gateway::describe_internet_gateways(self, &params)
                }
                "DescribeImages" => describe::describe_images(self, &params),
                "CreateVolume" => volume::create_volume(self, &params).await,
                "DescribeVolumes" => volume::describe_volumes(self, &params),
                "DeleteVolume" => volume::delete_volume(self, &params).await,
                "AttachVolume" => volume::attach_volume(self, &params).await,
                "DetachVolume" => volume::detach_volume(self, &params).await,
                "CreateKeyPair" => key_pair::create_key_pair(self, &params),
                "ImportKeyPair" => key_pair::import_key_pair(self, &params),
                "DescribeKeyPairs" => key_pair::describe_key_pairs(self, &params),
                "DeleteKeyPair" => key_pair::delete_key_pair(self, &params).await,
                "CreateLaunchTemplate" => launch_template::create_launch_template(self, &params),
                "DescribeLaunchTemplates" => {
                    launch_template::describe_launch_templates(self, &params)
                }
                "DeleteLaunchTemplate" => {
                    launch_template::delete_launch_template(self, &params).await
                }
                "CreateTags" => tags::create_tags(self, &params),
                "DeleteTags" => tags::delete_tags(self, &params),
                "DescribeTags" => tags::describe_tags(self, &params),
                "DescribeNetworkInterfaces" => {
                    describe::describe_network_interfaces(self, &params)
                }
                "DescribeNetworkAcls" => describe::describe_network_acls(self, &params),
                "DescribeRouteTables" => describe::describe_route_tables(self, &params),
                "RunInstances" => instance::run_instances(self, &params).await,
                "DescribeInstances" => instance::describe_instances(self, &params),
                "StartInstances" => instance::start_instances(self, &params).await,
                "StopInstances" => instance::stop_instances(self, &params).await,
                "TerminateInstances" => instance::terminate_instances(self, &params).await,
                "DescribeInstanceTypes" => describe::describe_instance_types(self, &params),
                "DescribeInstanceAttribute" => {
                    describe::describe_instance_attribute(self, &params)
                }
                "DescribeInstanceCreditSpecifications" => {
                    describe::describe_instance_credit_specifications(self, &params)
                }
                other => Err(AwsError::invalid_action(other)),
            }
        })
        .await
    }
}

impl Ec2Service {
    pub fn new(
        resources: Arc<ResourceManager>,
        states: Arc<StateMachineManager>,
        region: &str,
        delays: DelaySettings,
    ) -> Self {
        Ec2Service {
            resources,
            states,
            region: region.to_string(),
            delays,
        }
    }

    /// Place the default account resources in store and graph.
    pub fn seed_defaults(&self) {
        defaults::seed(self);
    }

    // -- shared helpers --------------------------------------------------

    pub(crate) fn node(kind: &str, id: &str) -> NodeId {
        NodeId::new(SERVICE, kind, id)
    }

    /// The AWS not-found code for a kind; EC2 not-found errors are 400s.
    pub(crate) fn not_found(kind: &str, id: &str) -> AwsError {
        let code = match kind {
            "vpcs" => "InvalidVpcID.NotFound",
            "subnets" => "InvalidSubnetID.NotFound",
            "security-groups" => "InvalidGroup.NotFound",
            "security-group-rules" => "InvalidSecurityGroupRuleId.NotFound",
            "internet-gateways" => "InvalidInternetGatewayID.NotFound",
            "volumes" => "InvalidVolume.NotFound",
            "instances" => "InvalidInstanceID.NotFound",
            "key-pairs" => "InvalidKeyPair.NotFound",
            "launch-templates" => "InvalidLaunchTemplateId.NotFound",
            "route-tables" => "InvalidRouteTableID.NotFound",
            "network-acls" => "InvalidNetworkAclID.NotFound",
            "network-interfaces" => "InvalidNetworkInterfaceID.NotFound",
            "images" => "InvalidAMIID.NotFound",
            _ => "InvalidParameterValue",
        };
        AwsError::not_found(
            code,
            format!("The id '{}' does not exist", id),
            StatusCode::BAD_REQUEST,
        )
    }

    pub(crate) fn load(&self, kind: &str, id: &str) -> Result<Value, AwsError> {
        self.resources
            .store()
            .get_raw(&common::resource_key(SERVICE, kind, id))
            .map_err(|_| Self::not_found(kind, id))
    }

    pub(crate) fn list_kind(&self, kind: &str) -> Vec<Value> {
        let store = self.resources.store();
        store
            .list(&common::kind_prefix(SERVICE, kind))
            .iter()
            .filter_map(|key| store.get_raw(key).ok())
            .collect()
    }

    /// Draw an id, re-drawing while the candidate key already exists.
    pub(crate) fn fresh_id(&self, kind: &str, prefix: &str) -> String {
        loop {
            let id = ids::short_id(prefix);
            if !self
                .resources
                .store()
                .exists(&common::resource_key(SERVICE, kind, &id))
            {
                return id;
            }
        }
    }

    pub(crate) fn fresh_instance_id(&self) -> String {
        loop {
            let id = ids::instance_id();
            if !self
                .resources
                .store()
                .exists(&common::resource_key(SERVICE, "instances", &id))
            {
                return id;
            }
        }
    }

    // -- tags ------------------------------------------------------------

    fn tag_key(id: &str) -> String {
        format!("ec2:tags:{}", id)
    }

    /// The per-resource tag store entry, as a flat map.
    pub(crate) fn tags_of(&self, id: &str) -> Map<String, Value> {
        self.resources
            .store()
            .get_raw(&Self::tag_key(id))
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
    }

    /// Merge `pairs` into the tag store entry for `id`, last write wins.
    pub(crate) fn write_tags(&self, id: &str, pairs: &[(String, String)]) -> Result<(), AwsError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut merged = self.tags_of(id);
        for (key, value) in pairs {
            merged.insert(key.clone(), json!(value));
        }
        self.resources
            .store()
            .set(&Self::tag_key(id), &Value::Object(merged))
            .map_err(AwsError::from)
    }

    pub(crate) fn drop_tag_record(&self, id: &str) {
        self.resources.store().delete(&Self::tag_key(id));
    }

    /// The union of the record's embedded tags and the tag store entry,
    /// tag store winning on key collision, rendered as a `tagSet`.
    pub(crate) fn merged_tag_set(&self, id: &str, record: &Value) -> Value {
        let mut merged: Map<String, Value> = record
            .get("tags")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (key, value) in self.tags_of(id) {
            merged.insert(key, value);
        }
        let items: Vec<Value> = merged
            .into_iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        json!({ "item": items })
    }

    /// Render a record for a describe response: embedded tags and tag
    /// store merged into a `tagSet`, internal fields dropped.
    pub(crate) fn render(&self, id: &str, record: &Value) -> Value {
        let mut rendered = record.clone();
        if let Some(obj) = rendered.as_object_mut() {
            obj.remove("tags");
            obj.insert("tagSet".to_string(), self.merged_tag_set(id, record));
        }
        rendered
    }

    // -- parameter helpers ----------------------------------------------

    pub(crate) fn require<'a>(
        params: &'a HashMap<String, String>,
        name: &str,
    ) -> Result<&'a str, AwsError> {
        params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AwsError::missing_parameter(name))
    }

    /// Tag pairs from `TagSpecification.N` entries matching `resource_type`.
    pub(crate) fn tag_spec_pairs(
        params: &HashMap<String, String>,
        resource_type: &str,
    ) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for spec in p::indexed_groups(params, "TagSpecification") {
            if spec.get("ResourceType").map(String::as_str) != Some(resource_type) {
                continue;
            }
            for tag in p::indexed_groups(&spec, "Tag") {
                if let (Some(key), Some(value)) = (tag.get("Key"), tag.get("Value")) {
                    pairs.push((key.clone(), value.clone()));
                }
            }
        }
        pairs
    }

    /// Parsed `Filter.N.Name` / `Filter.N.Value.M` pairs.
    pub(crate) fn filters(params: &HashMap<String, String>) -> Vec<(String, Vec<String>)> {
        p::indexed_groups(params, "Filter")
            .into_iter()
            .filter_map(|group| {
                let name = group.get("Name")?.clone();
                let values = p::indexed_values(&group, "Value");
                Some((name, values))
            })
            .collect()
    }

    /// Whether a rendered record matches every filter. Unknown filter
    /// names are ignored rather than failing the request.
    pub(crate) fn matches_filters(
        &self,
        id: &str,
        record: &Value,
        filters: &[(String, Vec<String>)],
    ) -> bool {
        for (name, values) in filters {
            let matched = if let Some(tag_name) = name.strip_prefix("tag:") {
                let tags = self.merged_tag_set(id, record);
                tags["item"]
                    .as_array()
                    .map(|items| {
                        items.iter().any(|t| {
                            t["key"].as_str() == Some(tag_name)
                                && values.iter().any(|v| t["value"].as_str() == Some(v))
                        })
                    })
                    .unwrap_or(false)
            } else if name == "tag-key" {
                let tags = self.merged_tag_set(id, record);
                tags["item"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .any(|t| values.iter().any(|v| t["key"].as_str() == Some(v)))
                    })
                    .unwrap_or(false)
            } else {
                match filter_field(name) {
                    Some(field) => record
                        .get(field)
                        .map(|actual| values.iter().any(|v| value_matches(actual, v)))
                        .unwrap_or(false),
                    None => continue,
                }
            };
            if !matched {
                return false;
            }
        }
        true
    }
}

/// Record field a describe filter name selects on.
fn filter_field(name: &str) -> Option<&'static str> {
    match name {
        "vpc-id" => Some("vpcId"),
        "subnet-id" => Some("subnetId"),
        "state" => Some("state"),
        "group-id" => Some("groupId"),
        "group-name" => Some("groupName"),
        "cidr" | "cidr-block" => Some("cidrBlock"),
        "availability-zone" => Some("availabilityZone"),
        "instance-type" => Some("instanceType"),
        "image-id" => Some("imageId"),
        "key-name" => Some("keyName"),
        "is-default" | "isDefault" => Some("isDefault"),
        _ => None,
    }
}

fn value_matches(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::String(s) => s == expected,
        Value::Bool(b) => expected.parse::<bool>().map(|e| e == *b).unwrap_or(false),
        Value::Number(n) => n.to_string() == expected,
        _ => false,
    }
}

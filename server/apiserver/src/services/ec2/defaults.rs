/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Default account resources seeded at service construction.
//!
//! A fresh AWS account is never empty: SDKs and Terraform expect a default
//! VPC with its subnet, security group, network ACL, and route table, plus
//! describable AMIs and instance types. Seeding failures are logged and
//! never fatal — the defaults must appear in describe calls even if the
//! relationship schema was misconfigured.

use super::Ec2Service;
use resourcemanager::{EdgeType, NodeId};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

const DEFAULT_VPC_CIDR: &str = "172.31.0.0/16";
const DEFAULT_SUBNET_CIDR: &str = "172.31.0.0/20";

fn seed_resource(svc: &Ec2Service, node: &NodeId, record: &Value) {
    if let Err(e) = svc.resources.create_resource(node, HashMap::new(), record) {
        warn!(node = %node, error = %e, "failed to seed default resource");
    }
}

fn seed_edge(svc: &Ec2Service, from: &NodeId, to: &NodeId, edge_type: EdgeType) {
    if let Err(e) = svc
        .resources
        .add_relationship(from, to, edge_type, HashMap::new())
    {
        warn!(from = %from, to = %to, error = %e, "failed to seed default edge");
    }
}

/// Curated AMI records; ids match what public Terraform examples pin.
fn images() -> Vec<Value> {
    let entries = [
        ("ami-0c55b159cbfafe1f0", "ubuntu/images/hvm-ssd/ubuntu-bionic-18.04-amd64-server", "099720109477"),
        ("ami-0747bdcabd34c712a", "ubuntu/images/hvm-ssd/ubuntu-focal-20.04-amd64-server", "099720109477"),
        ("ami-0d5eff06f840b45e9", "amzn2-ami-hvm-2.0-x86_64-gp2", "137112412989"),
        ("ami-087c17d1fe0178315", "amzn2-ami-kernel-5.10-hvm-x86_64-gp2", "137112412989"),
        ("ami-0a91cd140a1fc148a", "debian-11-amd64", "136693071363"),
    ];
    entries
        .iter()
        .map(|(id, name, owner)| {
            json!({
                "imageId": id,
                "imageLocation": format!("{}/{}", owner, name),
                "imageState": "available",
                "imageOwnerId": owner,
                "name": name,
                "description": name,
                "imageType": "machine",
                "isPublic": true,
                "architecture": "x86_64",
                "rootDeviceType": "ebs",
                "rootDeviceName": "/dev/sda1",
                "virtualizationType": "hvm",
                "hypervisor": "xen"
            })
        })
        .collect()
}

fn instance_types() -> Vec<Value> {
    let entries: [(&str, i64, i64); 7] = [
        ("t2.micro", 1, 1024),
        ("t2.small", 1, 2048),
        ("t3.micro", 2, 1024),
        ("t3.small", 2, 2048),
        ("t3.medium", 2, 4096),
        ("m5.large", 2, 8192),
        ("c5.large", 2, 4096),
    ];
    entries
        .iter()
        .map(|(name, vcpus, memory)| {
            json!({
                "instanceType": name,
                "currentGeneration": true,
                "freeTierEligible": *name == "t2.micro",
                "supportedUsageClasses": { "item": ["on-demand", "spot"] },
                "supportedVirtualizationTypes": { "item": ["hvm"] },
                "bareMetal": false,
                "processorInfo": { "supportedArchitectures": { "item": ["x86_64"] } },
                "vCpuInfo": { "defaultVCpus": vcpus, "defaultCores": vcpus },
                "memoryInfo": { "sizeInMiB": memory },
                "instanceStorageSupported": false,
                "ebsInfo": { "ebsOptimizedSupport": "default" },
                "networkInfo": { "networkPerformance": "Up to 5 Gigabit" },
                "burstablePerformanceSupported": name.starts_with('t')
            })
        })
        .collect()
}

/// Seed the default VPC, its children, AMIs, and instance types into
/// store and graph.
pub(super) fn seed(svc: &Ec2Service) {
    let zone = format!("{}a", svc.region);

    let vpc_node = Ec2Service::node("vpcs", "vpc-default");
    seed_resource(
        svc,
        &vpc_node,
        &json!({
            "vpcId": "vpc-default",
            "state": "available",
            "cidrBlock": DEFAULT_VPC_CIDR,
            "isDefault": true,
            "ownerId": super::OWNER_ID,
            "instanceTenancy": "default",
            "dhcpOptionsId": "dopt-default"
        }),
    );

    let subnet_node = Ec2Service::node("subnets", "subnet-default");
    seed_resource(
        svc,
        &subnet_node,
        &json!({
            "subnetId": "subnet-default",
            "state": "available",
            "vpcId": "vpc-default",
            "cidrBlock": DEFAULT_SUBNET_CIDR,
            "availabilityZone": zone,
            "availableIpAddressCount": 4091,
            "defaultForAz": true,
            "mapPublicIpOnLaunch": true,
            "ownerId": super::OWNER_ID,
            "assignIpv6AddressOnCreation": false
        }),
    );
    seed_edge(svc, &subnet_node, &vpc_node, EdgeType::Contains);

    let sg_node = Ec2Service::node("security-groups", "sg-default");
    seed_resource(
        svc,
        &sg_node,
        &json!({
            "groupId": "sg-default",
            "groupName": "default",
            "groupDescription": "default VPC security group",
            "vpcId": "vpc-default",
            "ownerId": super::OWNER_ID,
            "ipPermissions": { "item": [] },
            "ipPermissionsEgress": { "item": [{
                "ipProtocol": "-1",
                "ipRanges": { "item": [{ "cidrIp": "0.0.0.0/0" }] }
            }]}
        }),
    );
    seed_edge(svc, &sg_node, &vpc_node, EdgeType::Contains);

    let acl_node = Ec2Service::node("network-acls", "acl-default");
    seed_resource(
        svc,
        &acl_node,
        &json!({
            "networkAclId": "acl-default",
            "vpcId": "vpc-default",
            "default": true,
            "ownerId": super::OWNER_ID,
            "entrySet": { "item": [
                { "ruleNumber": 100, "protocol": "-1", "ruleAction": "allow",
                  "egress": false, "cidrBlock": "0.0.0.0/0" },
                { "ruleNumber": 100, "protocol": "-1", "ruleAction": "allow",
                  "egress": true, "cidrBlock": "0.0.0.0/0" }
            ]},
            "associationSet": { "item": [{
                "networkAclAssociationId": "aclassoc-default",
                "networkAclId": "acl-default",
                "subnetId": "subnet-default"
            }]}
        }),
    );
    seed_edge(svc, &acl_node, &vpc_node, EdgeType::Contains);

    let rtb_node = Ec2Service::node("route-tables", "rtb-default");
    seed_resource(
        svc,
        &rtb_node,
        &json!({
            "routeTableId": "rtb-default",
            "vpcId": "vpc-default",
            "ownerId": super::OWNER_ID,
            "associationSet": { "item": [{
                "routeTableAssociationId": "rtbassoc-default",
                "routeTableId": "rtb-default",
                "main": true,
                "associationState": { "state": "associated" }
            }]},
            "routeSet": { "item": [{
                "destinationCidrBlock": DEFAULT_VPC_CIDR,
                "gatewayId": "local",
                "state": "active",
                "origin": "CreateRouteTable"
            }]}
        }),
    );
    seed_edge(svc, &rtb_node, &vpc_node, EdgeType::Contains);

    for image in images() {
        let id = image["imageId"].as_str().unwrap_or_default().to_string();
        seed_resource(svc, &Ec2Service::node("images", &id), &image);
    }
    for instance_type in instance_types() {
        let name = instance_type["instanceType"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        seed_resource(svc, &Ec2Service::node("instance-types", &name), &instance_type);
    }

    info!(
        vpc = "vpc-default",
        subnet = "subnet-default",
        "seeded default resources"
    );
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use common::setting::DelaySettings;
    use common::Store;
    use resourcemanager::{GraphConfig, RelationshipGraph, ResourceManager};
    use statemanager::StateMachineManager;
    use std::sync::Arc;

    fn service() -> Ec2Service {
        let store = Arc::new(Store::new());
        let graph = Arc::new(RelationshipGraph::new(
            resourcemanager::schema::default_schema(),
            GraphConfig::default(),
        ));
        let states = Arc::new(StateMachineManager::new(Arc::clone(&store)));
        let resources = Arc::new(ResourceManager::new(store, graph));
        Ec2Service::new(resources, states, "us-east-1", DelaySettings::default())
    }

    #[test]
    fn test_seed_places_defaults_in_store_and_graph() {
        let svc = service();
        seed(&svc);

        for key in [
            "ec2:vpcs:vpc-default",
            "ec2:subnets:subnet-default",
            "ec2:security-groups:sg-default",
            "ec2:network-acls:acl-default",
            "ec2:route-tables:rtb-default",
        ] {
            assert!(svc.resources.store().exists(key), "missing {key}");
        }
        assert!(svc
            .resources
            .graph()
            .has_node(&Ec2Service::node("vpcs", "vpc-default")));
        // The default VPC has its four children registered as dependents.
        let dependents = svc
            .resources
            .graph()
            .dependents(&Ec2Service::node("vpcs", "vpc-default"));
        assert_eq!(dependents.len(), 4);
    }

    #[test]
    fn test_seed_is_not_fatal_when_repeated() {
        let svc = service();
        seed(&svc);
        // A second seed hits duplicate-node errors and only warns.
        seed(&svc);
        assert!(svc.resources.store().exists("ec2:vpcs:vpc-default"));
    }

    #[test]
    fn test_seeded_images_include_the_pinned_ubuntu_ami() {
        let svc = service();
        seed(&svc);
        assert!(svc
            .resources
            .store()
            .exists("ec2:images:ami-0c55b159cbfafe1f0"));
        assert!(svc.list_kind("images").len() >= 4);
    }
}

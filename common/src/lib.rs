/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Shared building blocks for the Mirage emulator: the in-process state
//! store, layered settings, and the error types the service crates share.

pub mod error;
pub mod setting;
pub mod store;

pub use error::{Result, StoreError};
pub use store::Store;

/// Compose the store key for a resource: `service:kind:id`.
pub fn resource_key(service: &str, kind: &str, id: &str) -> String {
    format!("{}:{}:{}", service, kind, id)
}

/// Prefix that enumerates every record of one kind, trailing separator
/// included so `vpcs` does not match `vpcs-archive`.
pub fn kind_prefix(service: &str, kind: &str) -> String {
    format!("{}:{}:", service, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_layout() {
        assert_eq!(
            resource_key("ec2", "vpcs", "vpc-abc12345"),
            "ec2:vpcs:vpc-abc12345"
        );
    }

    #[test]
    fn test_kind_prefix_covers_key() {
        let key = resource_key("rds", "db-instances", "db1");
        assert!(key.starts_with(&kind_prefix("rds", "db-instances")));
    }
}

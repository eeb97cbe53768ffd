/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! In-process keyed state store.
//!
//! Keeps the familiar get/put/delete/list-with-prefix surface of an etcd
//! client, but over a process-local map: the emulator never persists and
//! every operation completes without awaiting. `update` is the transactional
//! primitive — fetch, mutate, write back under one critical section so no
//! get/set window is observable to other callers.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serializable keyed store with prefix enumeration.
///
/// Values are held as JSON documents; typed access goes through serde on
/// the way in and out. All locking is internal and held only for the
/// duration of a single call.
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<HashMap<String, Value>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A poisoned map is still structurally sound; keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch and deserialize the value at `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let map = self.lock();
        let value = map
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetch the raw JSON document at `key`.
    pub fn get_raw(&self, key: &str) -> Result<Value> {
        let map = self.lock();
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Serialize `value` and store it at `key`, replacing any prior value.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let doc = serde_json::to_value(value).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.lock().insert(key.to_string(), doc);
        Ok(())
    }

    /// Remove `key`. Deleting a missing key is a no-op.
    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Whether `key` currently holds a value.
    pub fn exists(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Snapshot of all keys starting with `prefix`, sorted.
    pub fn list(&self, prefix: &str) -> Vec<String> {
        let map = self.lock();
        let mut keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Fetch, apply `mutate`, and write back under a single critical
    /// section. Returns the mutated value. Fails with `NotFound` when the
    /// key is absent; the map is untouched on serialization failure.
    pub fn update<T, F>(&self, key: &str, mutate: F) -> Result<T>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut T),
    {
        let mut map = self.lock();
        let value = map
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let mut typed: T =
            serde_json::from_value(value.clone()).map_err(|e| StoreError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        mutate(&mut typed);
        let doc = serde_json::to_value(&typed).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        map.insert(key.to_string(), doc);
        Ok(typed)
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        state: String,
        size: u32,
    }

    #[test]
    fn test_set_get_roundtrip() {
        let store = Store::new();
        let rec = Record {
            state: "pending".into(),
            size: 8,
        };
        store.set("ec2:volumes:vol-1", &rec).unwrap();
        let loaded: Record = store.get("ec2:volumes:vol-1").unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = Store::new();
        let err = store.get::<Record>("ec2:volumes:vol-0").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = Store::new();
        store.delete("ec2:volumes:vol-0");
        assert!(!store.exists("ec2:volumes:vol-0"));
    }

    #[test]
    fn test_list_returns_sorted_prefix_snapshot() {
        let store = Store::new();
        for id in ["vol-b", "vol-a", "vol-c"] {
            store
                .set(&format!("ec2:volumes:{}", id), &Record { state: "available".into(), size: 1 })
                .unwrap();
        }
        store
            .set("ec2:vpcs:vpc-1", &Record { state: "available".into(), size: 0 })
            .unwrap();

        let keys = store.list("ec2:volumes:");
        assert_eq!(
            keys,
            vec!["ec2:volumes:vol-a", "ec2:volumes:vol-b", "ec2:volumes:vol-c"]
        );
    }

    #[test]
    fn test_update_mutates_in_place() {
        let store = Store::new();
        store
            .set("ec2:volumes:vol-1", &Record { state: "creating".into(), size: 8 })
            .unwrap();
        let updated: Record = store
            .update("ec2:volumes:vol-1", |r: &mut Record| {
                r.state = "available".into()
            })
            .unwrap();
        assert_eq!(updated.state, "available");
        let loaded: Record = store.get("ec2:volumes:vol-1").unwrap();
        assert_eq!(loaded.state, "available");
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = Store::new();
        let err = store
            .update("ec2:volumes:vol-0", |_r: &mut Record| {})
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

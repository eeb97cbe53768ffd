/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-kind state transition tables.
//!
//! The tables follow a table-driven approach: each resource kind maps a
//! source state to the sorted list of states it may move to. Terminal
//! states are present with an empty successor list, so an attempted move
//! out of them fails the same way any unlisted transition does.
//! `is_valid_transition` is a pure lookup with no side effects.

use crate::error::StateTransitionError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resource kinds with lifecycle state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Instance,
    Volume,
    Vpc,
    Subnet,
    Attachment,
    DbInstance,
}

type TransitionTable = HashMap<&'static str, Vec<&'static str>>;

fn table(entries: &[(&'static str, &[&'static str])]) -> TransitionTable {
    entries
        .iter()
        .map(|(from, tos)| (*from, tos.to_vec()))
        .collect()
}

lazy_static! {
    static ref TRANSITIONS: HashMap<ResourceKind, TransitionTable> = {
        let mut m = HashMap::new();
        m.insert(
            ResourceKind::Instance,
            table(&[
                ("pending", &["running", "shutting-down"]),
                ("running", &["shutting-down", "stopping"]),
                ("stopping", &["stopped"]),
                ("stopped", &["pending", "shutting-down"]),
                ("shutting-down", &["terminated"]),
                ("terminated", &[]),
            ]),
        );
        m.insert(
            ResourceKind::Volume,
            table(&[
                ("creating", &["available"]),
                ("available", &["deleting", "in-use"]),
                ("in-use", &["available"]),
                ("deleting", &["deleted"]),
                ("deleted", &[]),
            ]),
        );
        m.insert(
            ResourceKind::Vpc,
            table(&[("pending", &["available"]), ("available", &[])]),
        );
        m.insert(
            ResourceKind::Subnet,
            table(&[("pending", &["available"]), ("available", &[])]),
        );
        m.insert(
            ResourceKind::Attachment,
            table(&[
                ("attaching", &["attached", "detaching"]),
                ("attached", &["detaching"]),
                ("detaching", &["detached"]),
                ("detached", &[]),
            ]),
        );
        m.insert(
            ResourceKind::DbInstance,
            table(&[
                ("creating", &["available"]),
                ("available", &["deleting", "modifying", "rebooting", "stopping"]),
                ("modifying", &["available"]),
                ("rebooting", &["available"]),
                ("stopping", &["stopped"]),
                ("stopped", &["deleting", "starting"]),
                ("starting", &["available"]),
                ("deleting", &["deleted"]),
                ("deleted", &[]),
            ]),
        );
        m
    };
}

/// Whether the per-kind table allows moving `from` -> `to`.
///
/// Unknown source states have no successors; a self-transition is never
/// listed and therefore never valid.
pub fn is_valid_transition(kind: ResourceKind, from: &str, to: &str) -> bool {
    TRANSITIONS
        .get(&kind)
        .and_then(|t| t.get(from))
        .map(|succ| succ.contains(&to))
        .unwrap_or(false)
}

/// Whether `state` has an empty successor set in the table for `kind`.
pub fn is_terminal(kind: ResourceKind, state: &str) -> bool {
    TRANSITIONS
        .get(&kind)
        .and_then(|t| t.get(state))
        .map(|succ| succ.is_empty())
        .unwrap_or(false)
}

/// Table lookup that fails with a structured error instead of `false`.
pub fn validate_transition(
    kind: ResourceKind,
    id: &str,
    from: &str,
    to: &str,
) -> Result<(), StateTransitionError> {
    if is_valid_transition(kind, from, to) {
        Ok(())
    } else {
        Err(StateTransitionError {
            kind,
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_happy_path() {
        assert!(is_valid_transition(ResourceKind::Instance, "pending", "running"));
        assert!(is_valid_transition(ResourceKind::Instance, "running", "stopping"));
        assert!(is_valid_transition(ResourceKind::Instance, "stopping", "stopped"));
        assert!(is_valid_transition(ResourceKind::Instance, "stopped", "pending"));
        assert!(is_valid_transition(
            ResourceKind::Instance,
            "shutting-down",
            "terminated"
        ));
    }

    #[test]
    fn test_instance_invalid_moves() {
        // A running instance must stop before starting again.
        assert!(!is_valid_transition(ResourceKind::Instance, "running", "pending"));
        assert!(!is_valid_transition(ResourceKind::Instance, "pending", "stopped"));
        assert!(!is_valid_transition(ResourceKind::Instance, "stopping", "running"));
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        assert!(is_terminal(ResourceKind::Instance, "terminated"));
        assert!(is_terminal(ResourceKind::Volume, "deleted"));
        assert!(is_terminal(ResourceKind::Vpc, "available"));
        assert!(is_terminal(ResourceKind::Attachment, "detached"));
        assert!(!is_terminal(ResourceKind::Instance, "running"));
        assert!(!is_valid_transition(
            ResourceKind::Instance,
            "terminated",
            "pending"
        ));
    }

    #[test]
    fn test_unknown_state_has_no_successors() {
        assert!(!is_valid_transition(ResourceKind::Vpc, "limbo", "available"));
        assert!(!is_terminal(ResourceKind::Vpc, "limbo"));
    }

    #[test]
    fn test_volume_attach_cycle() {
        assert!(is_valid_transition(ResourceKind::Volume, "available", "in-use"));
        assert!(is_valid_transition(ResourceKind::Volume, "in-use", "available"));
        assert!(!is_valid_transition(ResourceKind::Volume, "in-use", "deleting"));
    }

    #[test]
    fn test_db_instance_lifecycle() {
        assert!(is_valid_transition(
            ResourceKind::DbInstance,
            "creating",
            "available"
        ));
        assert!(is_valid_transition(
            ResourceKind::DbInstance,
            "available",
            "stopping"
        ));
        assert!(is_valid_transition(ResourceKind::DbInstance, "stopped", "starting"));
        assert!(!is_valid_transition(
            ResourceKind::DbInstance,
            "stopped",
            "rebooting"
        ));
    }

    #[test]
    fn test_validate_transition_error_fields() {
        let err = validate_transition(ResourceKind::Instance, "i-0123", "running", "pending")
            .unwrap_err();
        assert_eq!(err.kind, ResourceKind::Instance);
        assert_eq!(err.id, "i-0123");
        assert_eq!(err.from, "running");
        assert_eq!(err.to, "pending");
    }

    #[test]
    fn test_successor_lists_are_sorted() {
        for table in TRANSITIONS.values() {
            for succ in table.values() {
                let mut sorted = succ.clone();
                sorted.sort_unstable();
                assert_eq!(*succ, sorted);
            }
        }
    }
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! State machine error types.

use crate::transitions::ResourceKind;
use common::StoreError;
use thiserror::Error;

/// A state change that the per-kind transition table does not allow.
///
/// Carries the structured fields the protocol layer formats into the
/// `IncorrectInstanceState` / `InvalidDBInstanceStateFault` messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid state transition for {kind:?} {id}: {from} -> {to}")]
pub struct StateTransitionError {
    pub kind: ResourceKind,
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Failure of a scheduled transition when it fires.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error(transparent)]
    Transition(#[from] StateTransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

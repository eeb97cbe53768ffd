/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Resource state machine engine for the Mirage emulator.
//!
//! Each emulated resource kind carries a transition table describing the
//! state changes AWS allows for it. The manager enforces those tables,
//! serializes access per resource key, and runs the delayed asynchronous
//! transitions (pending → available, stopping → stopped, …) that SDK
//! waiters poll for.

pub mod error;
pub mod manager;
pub mod transitions;

pub use error::{ScheduleError, StateTransitionError};
pub use manager::StateMachineManager;
pub use transitions::{is_valid_transition, validate_transition, ResourceKind};

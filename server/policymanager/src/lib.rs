/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Pre-flight safety rules for infrastructure-as-code plans.
//!
//! Before a plan is provisioned against the emulator, a registry of
//! built-in rules is evaluated against its resource changes: open SSH to
//! the world, publicly accessible databases, and similar foot-guns. The
//! runner honors a minimum severity threshold and an ignore list and
//! aggregates everything into a summary with an exit code the test
//! harness can act on.

pub mod error;
pub mod generate;
pub mod plan;
pub mod rules;
pub mod runner;

pub use error::PolicyError;
pub use generate::generate_plan;
pub use plan::{Change, Plan, ResourceChange};
pub use rules::{Rule, RuleOutcome, RuleRegistry, Severity};
pub use runner::{run, Options, RuleResult, Summary};

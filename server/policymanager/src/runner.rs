/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Rule runner: evaluate the registry against a plan and aggregate.

use crate::plan::Plan;
use crate::rules::{RuleRegistry, Severity};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Runner options supplied by the external harness.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Rules below this severity are skipped.
    pub min_severity: Option<Severity>,
    /// Rule ids skipped regardless of severity.
    pub ignore_rule_ids: Vec<String>,
}

/// One rule evaluation against one resource change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub description: String,
    pub resource: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

/// Aggregated run outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub results: Vec<RuleResult>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    /// 1 when any rule failed, else 0.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

/// Evaluate every applicable rule against every managed resource change.
///
/// Data sources and no-op changes are skipped entirely. Rules below the
/// minimum severity or on the ignore list count as skipped. Results are
/// sorted failures first, then descending severity, then rule id.
pub fn run(plan: &Plan, registry: &RuleRegistry, options: &Options) -> Summary {
    let mut summary = Summary::default();

    for change in &plan.resource_changes {
        if change.is_data_source() || change.is_noop() {
            continue;
        }
        for rule in registry.rules_for_resource(&change.resource_type) {
            if let Some(min) = options.min_severity {
                if rule.severity() < min {
                    summary.skipped += 1;
                    continue;
                }
            }
            if options.ignore_rule_ids.iter().any(|id| id == rule.id()) {
                summary.skipped += 1;
                continue;
            }
            let outcome = rule.check(change);
            debug!(
                rule = rule.id(),
                resource = change.address,
                passed = outcome.passed,
                "evaluated rule"
            );
            if outcome.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(RuleResult {
                rule_id: rule.id().to_string(),
                description: rule.description().to_string(),
                resource: change.address.clone(),
                severity: rule.severity(),
                passed: outcome.passed,
                message: outcome.message,
            });
        }
    }

    summary.results.sort_by(|a, b| {
        a.passed
            .cmp(&b.passed)
            .then(b.severity.cmp(&a.severity))
            .then(a.rule_id.cmp(&b.rule_id))
    });
    summary
}

/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Emulator settings, layered from `/etc/mirage/settings.yaml` over
//! built-in defaults.

use serde::Deserialize;
use std::sync::OnceLock;
static SETTINGS: OnceLock<Settings> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: HostSettings,
    pub region: String,
    /// Access keys admitted by the SigV4 middleware.
    pub access_keys: Vec<String>,
    pub delays: DelaySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostSettings {
    pub bind_address: String,
    pub bind_port: u16,
}

/// Asynchronous transition latencies, in milliseconds.
///
/// Defaults approximate observed AWS behavior closely enough for SDK
/// waiters; tests override them to keep runs fast.
#[derive(Debug, Clone, Deserialize)]
pub struct DelaySettings {
    pub vpc_available_ms: u64,
    pub subnet_available_ms: u64,
    pub instance_transition_ms: u64,
    pub volume_transition_ms: u64,
    pub db_instance_transition_ms: u64,
    /// Delay between `terminated` and the record vanishing.
    pub termination_removal_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: HostSettings {
                bind_address: String::from("0.0.0.0"),
                bind_port: 4566,
            },
            region: String::from("us-east-1"),
            access_keys: vec![String::from("test")],
            delays: DelaySettings::default(),
        }
    }
}

impl Default for DelaySettings {
    fn default() -> Self {
        DelaySettings {
            vpc_available_ms: 2_000,
            subnet_available_ms: 1_000,
            instance_transition_ms: 5_000,
            volume_transition_ms: 2_000,
            db_instance_transition_ms: 3_000,
            termination_removal_ms: 30_000,
        }
    }
}

fn parse_settings_yaml() -> Settings {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("/etc/mirage/settings.yaml"))
        .build();

    match settings {
        Ok(result) => result
            .try_deserialize::<Settings>()
            .unwrap_or_else(|_| Settings::default()),
        Err(_) => Settings::default(),
    }
}

pub fn get_config() -> &'static Settings {
    SETTINGS.get_or_init(parse_settings_yaml)
}

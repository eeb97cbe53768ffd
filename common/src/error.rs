/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Error types shared across the emulator crates.

use thiserror::Error;

/// Errors surfaced by the in-process state store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error for key {key}: {reason}")]
    Serialization { key: String, reason: String },
}

impl StoreError {
    /// Whether this error is a missing-key error, regardless of the key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

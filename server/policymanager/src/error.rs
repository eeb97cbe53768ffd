/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Policy engine error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("plan json error: {0}")]
    Json(#[from] serde_json::Error),
}

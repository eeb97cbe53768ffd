/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Plan generation via the terraform CLI.

use crate::error::PolicyError;
use crate::plan::Plan;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Produce a parsed plan for the module at `dir`.
///
/// The input is validated before anything is executed: a missing path or
/// a plain file fails with `NotADirectory` without shelling out. Plan
/// generation runs `terraform plan` into a scratch file and renders it
/// with `terraform show -json`.
pub async fn generate_plan(dir: &Path) -> Result<Plan, PolicyError> {
    if !dir.is_dir() {
        return Err(PolicyError::NotADirectory(dir.to_path_buf()));
    }

    info!(dir = %dir.display(), "generating plan");
    run_terraform(dir, &["plan", "-out=mirage.tfplan", "-input=false"]).await?;
    let rendered = run_terraform(dir, &["show", "-json", "mirage.tfplan"]).await?;
    let plan: Plan = serde_json::from_str(&rendered)?;
    Ok(plan)
}

async fn run_terraform(dir: &Path, args: &[&str]) -> Result<String, PolicyError> {
    let output = Command::new("terraform")
        .args(args)
        .current_dir(dir)
        .output()
        .await?;
    if !output.status.success() {
        return Err(PolicyError::Command {
            program: "terraform".to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

//UNIT TEST CASES
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_path_fails_before_shell_out() {
        let err = generate_plan(Path::new("/nonexistent/module"))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_plain_file_fails_before_shell_out() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = generate_plan(file.path()).await.unwrap_err();
        assert!(matches!(err, PolicyError::NotADirectory(_)));
    }
}

//! Installed-package and ML-runtime probing.
//!
//! Shells out to the host's Python toolchain. Each probe fills either
//! its data field or its `*_error` field; a host without Python still
//! answers with both errors populated.

use std::time::Duration;

use borealis_protocol::EnvironmentInfo;

use crate::command;

const PIP_TIMEOUT: Duration = Duration::from_secs(30);
const COLLECT_ENV_TIMEOUT: Duration = Duration::from_secs(60);

/// Probes the host Python interpreter for packages and runtime details.
#[derive(Debug, Clone)]
pub struct EnvironmentProber {
    python: String,
}

impl Default for EnvironmentProber {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }
}

impl EnvironmentProber {
    /// Uses `python` as the interpreter binary. Intended for tests.
    pub fn with_python(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub async fn probe(&self) -> EnvironmentInfo {
        let mut info = EnvironmentInfo::default();

        match command::run(
            &self.python,
            &["-m", "pip", "list", "--format=json"],
            PIP_TIMEOUT,
        )
        .await
        {
            Ok(stdout) => match parse_package_list(&stdout) {
                Ok(packages) => info.packages = Some(packages),
                Err(e) => info.packages_error = Some(e),
            },
            Err(e) => info.packages_error = Some(e.to_string()),
        }

        match command::run(
            &self.python,
            &["-m", "torch.utils.collect_env"],
            COLLECT_ENV_TIMEOUT,
        )
        .await
        {
            Ok(stdout) => info.runtime_env = Some(stdout),
            Err(e) => info.runtime_env_error = Some(e.to_string()),
        }

        info
    }
}

/// Validates the pip listing as a JSON array of package records.
fn parse_package_list(stdout: &str) -> Result<serde_json::Value, String> {
    let value: serde_json::Value =
        serde_json::from_str(stdout).map_err(|e| format!("unparseable package list: {e}"))?;
    if value.is_array() {
        Ok(value)
    } else {
        Err("package list is not a JSON array".to_string())
    }
}

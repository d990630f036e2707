use std::{
    ffi::OsStr,
    path::PathBuf,
    process::Command,
};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Thin wrapper over the `aws` command line client
///
/// Every call requests JSON output. Credentials come from the environment the
/// process runs in.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: PathBuf,
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(program: impl Into<PathBuf>, region: Option<String>, profile: Option<String>) -> Self {
        Self {
            program: program.into(),
            region,
            profile,
        }
    }

    fn command(&self, service: &str, operation: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--output").arg("json");
        if let Some(region) = &self.region {
            cmd.arg("--region").arg(region);
        }
        if let Some(profile) = &self.profile {
            cmd.arg("--profile").arg(profile);
        }
        cmd.arg(service).arg(operation);
        cmd
    }

    /// Run `aws <service> <operation> <args...>` and return its stdout
    pub fn run<I, S>(&self, service: &str, operation: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(service, operation);
        cmd.args(args);
        tracing::debug!("Running {:?}", cmd);

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute aws {} {}", service, operation))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("aws {} {} failed: {}", service, operation, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like [`AwsCli::run`], parsing stdout as JSON
    pub fn run_json<T, I, S>(&self, service: &str, operation: &str, args: I) -> Result<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let stdout = self.run(service, operation, args)?;
        serde_json::from_str(&stdout).with_context(|| {
            format!("Failed to parse aws {} {} output as JSON", service, operation)
        })
    }

    /// Check that the client can be executed at all
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} --version failed: {}", self.program.display(), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new("aws", None, None)
    }
}

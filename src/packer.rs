//! Image building with Packer.

use std::path::Path;
use std::time::Duration;

use crate::error::VmAgentError;
use crate::runner::ToolCommand;

/// Variables handed to the Packer template, in command-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVars {
    pub agent_token: String,
    pub memory: u32,
    pub google_credential: String,
}

impl BuildVars {
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            ("agent_token", self.agent_token.clone()),
            ("memory", self.memory.to_string()),
            ("google_credential", self.google_credential.clone()),
        ]
    }
}

/// `packer build -var k=v ... <template>`
pub fn build_command(packer: &str, vars: &BuildVars, template: &str) -> ToolCommand {
    let mut cmd = ToolCommand::new(packer, "packer-build").arg("build");
    for (key, value) in vars.pairs() {
        cmd = cmd.arg("-var").arg(format!("{key}={value}"));
    }
    cmd.arg(template).secret(vars.agent_token.clone())
}

/// Delete a box artifact left over from a previous build.
///
/// Returns whether a file was removed.
pub fn remove_stale_artifact(path: &Path) -> Result<bool, VmAgentError> {
    if !path.is_file() {
        return Ok(false);
    }
    std::fs::remove_file(path).map_err(|source| VmAgentError::Io {
        context: format!("removing stale artifact {}", path.display()),
        source,
    })?;
    tracing::info!(path = %path.display(), "removed stale box artifact");
    Ok(true)
}

/// Block until `path` exists, checking every `interval`. Never times out.
pub async fn wait_for_artifact(path: &Path, interval: Duration) -> u64 {
    let mut polls = 0;
    while !path.is_file() {
        polls += 1;
        tracing::debug!(path = %path.display(), polls, "box artifact not present yet");
        tokio::time::sleep(interval).await;
    }
    tracing::info!(path = %path.display(), "box artifact present");
    polls
}

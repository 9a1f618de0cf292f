//! Command-backed tools declared in TOML manifests.
//!
//! ```toml
//! [[tool]]
//! name = "weather"
//! description = "Current weather for a city"
//! command = ["./scripts/weather.sh"]
//! confirm = false
//!
//! [tool.parameters]
//! type = "object"
//! required = ["city"]
//! properties.city = { type = "string", description = "City name" }
//! ```
//!
//! The tool call's JSON arguments are written to the command's stdin. Its
//! stdout becomes the result, parsed as JSON when possible. A non-zero exit
//! status is reported to the model as a tool error.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use super::arguments::ToolArguments;
use super::builtin::USER_DENIED;
use super::tool::{Tool, ToolExecutionContext};
use super::types::AgentToolParameters;
use crate::error::{ParleyError, Result};
use crate::interaction::Interaction;

#[derive(Debug, Deserialize)]
struct ToolManifest {
    #[serde(default)]
    tool: Vec<ExternalToolSpec>,
}

/// One `[[tool]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalToolSpec {
    pub name: String,
    pub description: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    #[serde(default)]
    pub confirm: bool,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// A tool that runs an external program.
pub struct CommandTool {
    spec: ExternalToolSpec,
    parameters: AgentToolParameters,
    interaction: Arc<dyn Interaction>,
}

impl CommandTool {
    pub fn new(spec: ExternalToolSpec, interaction: Arc<dyn Interaction>) -> Result<Self> {
        if spec.name.trim().is_empty() {
            return Err(ParleyError::Configuration("external tool without a name".into()));
        }
        if spec.command.is_empty() {
            return Err(ParleyError::Configuration(format!(
                "external tool '{}' has an empty command",
                spec.name
            )));
        }
        let parameters = spec
            .parameters
            .clone()
            .map(AgentToolParameters::from_schema)
            .unwrap_or_else(AgentToolParameters::empty);
        Ok(Self {
            spec,
            parameters,
            interaction,
        })
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value> {
        let input = serde_json::to_vec(args.raw())?;
        if self.spec.confirm {
            let message = format!(
                "Run {}: {} {}",
                self.spec.name,
                self.spec.command.join(" "),
                String::from_utf8_lossy(&input)
            );
            if !self.interaction.confirm(&message).await? {
                return Ok(USER_DENIED.into());
            }
        }

        let tool_err = |message: String| ParleyError::tool(&self.spec.name, message);
        let mut child = tokio::process::Command::new(&self.spec.command[0])
            .args(&self.spec.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| tool_err(format!("failed to start {}: {e}", self.spec.command[0])))?;

        if let Some(mut stdin) = child.stdin.take() {
            // Commands that ignore their input may exit before reading it.
            if let Err(e) = stdin.write_all(&input).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(tool_err(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| trimmed.into()))
    }
}

/// Parse a manifest's text into tools.
pub fn parse_manifest(raw: &str, interaction: Arc<dyn Interaction>) -> Result<Vec<Arc<dyn Tool>>> {
    let manifest: ToolManifest = toml::from_str(raw)?;
    manifest
        .tool
        .into_iter()
        .map(|spec| Ok(Arc::new(CommandTool::new(spec, interaction.clone())?) as Arc<dyn Tool>))
        .collect()
}

/// Read a manifest file into tools.
pub fn load_manifest(path: &Path, interaction: Arc<dyn Interaction>) -> Result<Vec<Arc<dyn Tool>>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ParleyError::Configuration(format!("cannot read tool manifest {}: {e}", path.display()))
    })?;
    let tools = parse_manifest(&raw, interaction)?;
    tracing::debug!(path = %path.display(), count = tools.len(), "loaded external tools");
    Ok(tools)
}

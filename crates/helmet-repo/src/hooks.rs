//! Chart update hooks
//!
//! `on_downloaded` sees the staged chart before it replaces the local copy, so
//! a failing hook aborts the update and leaves the local copy untouched.
//! `on_updated` runs only after a replacement actually happened.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{RepoError, Result};
use crate::manifest::HookCommands;
use crate::source::RemoteChartSource;

/// What a hook is told about the chart
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Local chart name (manifest key)
    pub chart_name: &'a str,

    /// Chart directory the hook applies to
    pub chart_path: &'a Path,

    /// Directory where generated types for the chart live
    pub types_path: &'a Path,

    pub source: &'a RemoteChartSource,
}

/// Callbacks around a chart update
#[async_trait]
pub trait ChartHook: Send + Sync {
    /// Called with the staged chart, before replacement
    async fn on_downloaded(&self, _ctx: &HookContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called with the final chart path, after replacement
    async fn on_updated(&self, _ctx: &HookContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Hook that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ChartHook for NoopHook {}

/// Hook running shell commands declared in the chart manifest
#[derive(Debug, Clone, Default)]
pub struct CommandHook {
    commands: HookCommands,
}

impl CommandHook {
    pub fn new(commands: HookCommands) -> Self {
        Self { commands }
    }

    async fn run(&self, hook: &str, command: &str, ctx: &HookContext<'_>) -> Result<()> {
        tracing::info!(chart = ctx.chart_name, hook, command, "running hook");

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("HELMET_CHART_NAME", ctx.chart_name)
            .env("HELMET_CHART_PATH", ctx.chart_path)
            .env("HELMET_TYPES_PATH", ctx.types_path)
            .env("HELMET_CHART_VERSION", ctx.source.requested_version())
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| RepoError::HookFailed {
                name: ctx.chart_name.to_string(),
                hook: hook.to_string(),
                message: format!("Failed to spawn sh: {}", e),
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(chart = ctx.chart_name, hook, "{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RepoError::HookFailed {
                name: ctx.chart_name.to_string(),
                hook: hook.to_string(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ChartHook for CommandHook {
    async fn on_downloaded(&self, ctx: &HookContext<'_>) -> Result<()> {
        match &self.commands.downloaded {
            Some(command) => self.run("downloaded", command, ctx).await,
            None => Ok(()),
        }
    }

    async fn on_updated(&self, ctx: &HookContext<'_>) -> Result<()> {
        match &self.commands.updated {
            Some(command) => self.run("updated", command, ctx).await,
            None => Ok(()),
        }
    }
}

//! External toolchain adapters
//!
//! A [`Toolchain`] turns one source unit into one binary artifact inside the
//! job's scratch workspace. The engine never interprets compiler output: on
//! failure the diagnostics are passed through unchanged.

mod command;
mod cython;
mod simulated;

pub use command::CommandToolchain;
pub use cython::CythonToolchain;
pub use simulated::SimulatedToolchain;

use crate::config::{ToolchainConfig, ToolchainKind};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use extforge_types::{Acceleration, CompileJob, ToolchainOptions};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Output of a successful toolchain invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainRun {
    /// Combined stdout and stderr
    pub output: String,
}

/// A failed toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainFailure {
    /// Exit status, if the process ran at all
    pub status: Option<i32>,
    /// Combined stdout and stderr, verbatim
    pub diagnostics: String,
}

impl ToolchainFailure {
    pub fn new(status: Option<i32>, diagnostics: impl Into<String>) -> Self {
        Self {
            status,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Capability to compile a single unit.
///
/// Implementations write only beneath `job.workspace`; concurrent calls for
/// different jobs must not interfere.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Compile `job.unit` into an artifact inside `job.workspace`.
    async fn build(
        &self,
        job: &CompileJob,
        options: &ToolchainOptions,
    ) -> Result<ToolchainRun, ToolchainFailure>;
}

/// Construct the toolchain selected by configuration.
pub fn from_config(config: &ToolchainConfig) -> EngineResult<Arc<dyn Toolchain>> {
    match config.kind {
        ToolchainKind::Cython => {
            let mut toolchain = CythonToolchain::new(config.python.as_deref())
                .with_language_level(config.language_level.clone());
            if let Some(program) = &config.program {
                toolchain = toolchain.with_program(program.clone());
            }
            Ok(Arc::new(toolchain))
        }
        ToolchainKind::Command => {
            let program = config.program.clone().ok_or_else(|| {
                EngineError::configuration("the command toolchain requires `toolchain.program`")
            })?;
            Ok(Arc::new(CommandToolchain::new(program, config.args.clone())))
        }
    }
}

/// Route C/C++ compiler invocations through the acceleration wrapper.
pub(crate) fn apply_acceleration(command: &mut Command, acceleration: &Acceleration) {
    if let Some(wrapper) = acceleration.path() {
        let cc = std::env::var("CC").unwrap_or_else(|_| "gcc".to_string());
        let cxx = std::env::var("CXX").unwrap_or_else(|_| "g++".to_string());
        command.env("CC", format!("{} {}", wrapper.display(), cc));
        command.env("CXX", format!("{} {}", wrapper.display(), cxx));
    }
}

/// Run a prepared command to completion, capturing everything it prints.
pub(crate) async fn run_captured(
    mut command: Command,
    program: &str,
) -> Result<ToolchainRun, ToolchainFailure> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = ?command.as_std(), "Invoking toolchain");

    let output = command.output().await.map_err(|e| {
        ToolchainFailure::new(None, format!("failed to start `{program}`: {e}"))
    })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        Ok(ToolchainRun { output: text })
    } else {
        Err(ToolchainFailure::new(output.status.code(), text))
    }
}

use super::{Toolchain, ToolchainFailure, ToolchainRun};
use async_trait::async_trait;
use extforge_types::{CompileJob, ToolchainOptions};

/// An in-process toolchain used for testing and dry runs.
///
/// Writes `<stem>.<artifact_extension>` (plus an intermediate `<stem>.c`)
/// into the workspace. A source containing the failure marker is rejected
/// with a diagnostic pointing at the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedToolchain {
    artifact_extension: String,
    failure_marker: String,
}

impl SimulatedToolchain {
    pub fn new(artifact_extension: impl Into<String>) -> Self {
        Self {
            artifact_extension: artifact_extension.into(),
            failure_marker: "#error".to_string(),
        }
    }

    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.failure_marker = marker.into();
        self
    }
}

#[async_trait]
impl Toolchain for SimulatedToolchain {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn build(
        &self,
        job: &CompileJob,
        options: &ToolchainOptions,
    ) -> Result<ToolchainRun, ToolchainFailure> {
        let source = tokio::fs::read_to_string(&job.unit.path)
            .await
            .map_err(|e| ToolchainFailure::new(Some(1), format!("{}: {e}", job.unit)))?;

        if let Some((line_no, line)) = source
            .lines()
            .enumerate()
            .find(|(_, line)| line.contains(&self.failure_marker))
        {
            return Err(ToolchainFailure::new(
                Some(1),
                format!("{}:{}: {}\n", job.unit, line_no + 1, line.trim()),
            ));
        }

        let stem = job.unit.stem();
        let intermediate = job.workspace.join(format!("{stem}.c"));
        let artifact = job
            .workspace
            .join(format!("{stem}.{}", self.artifact_extension));

        let write = |path: std::path::PathBuf, body: String| async move {
            tokio::fs::write(&path, body)
                .await
                .map_err(|e| ToolchainFailure::new(Some(1), format!("{}: {e}", path.display())))
        };
        write(intermediate, format!("/* generated from {} */\n", job.unit)).await?;
        write(
            artifact,
            format!(
                "module {} -O{}\n{}",
                job.unit.module_name(),
                options.optimization_level,
                source
            ),
        )
        .await?;

        Ok(ToolchainRun {
            output: format!("compiled {}\n", job.unit),
        })
    }
}

//! Unit compiler
//!
//! Prepares a job's scratch workspace, runs the toolchain, and locates the
//! produced artifact. Every call yields exactly one [`CompileOutcome`].

use crate::toolchain::Toolchain;
use extforge_types::{CompileJob, CompileOutcome, ToolchainOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Compiles single jobs with a shared toolchain and fixed options.
pub struct UnitCompiler {
    toolchain: Arc<dyn Toolchain>,
    options: ToolchainOptions,
    artifact_extension: String,
}

impl UnitCompiler {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        options: ToolchainOptions,
        artifact_extension: impl Into<String>,
    ) -> Self {
        Self {
            toolchain,
            options,
            artifact_extension: artifact_extension.into(),
        }
    }

    pub fn options(&self) -> &ToolchainOptions {
        &self.options
    }

    pub fn toolchain_name(&self) -> &str {
        self.toolchain.name()
    }

    /// Compile one job. Failures are returned as outcomes, never as errors.
    pub async fn compile(&self, job: CompileJob) -> CompileOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&job.workspace).await {
            let diagnostics = format!(
                "failed to create scratch workspace {}: {e}",
                job.workspace.display()
            );
            return CompileOutcome::Failure { job, diagnostics };
        }

        let run = match self.toolchain.build(&job, &self.options).await {
            Ok(run) => run,
            Err(failure) => {
                return CompileOutcome::Failure {
                    job,
                    diagnostics: failure.diagnostics,
                }
            }
        };

        let stem = job.unit.stem();
        match locate_artifact(&job.workspace, &stem, &self.artifact_extension) {
            Some(artifact) => CompileOutcome::Success { job, artifact },
            None => {
                let mut diagnostics = format!(
                    "{} reported success but produced no {stem}.*{} artifact in {}\n",
                    self.toolchain.name(),
                    self.artifact_extension_suffix(),
                    job.workspace.display()
                );
                diagnostics.push_str(&run.output);
                CompileOutcome::Failure { job, diagnostics }
            }
        }
    }

    fn artifact_extension_suffix(&self) -> String {
        format!(".{}", self.artifact_extension)
    }
}

/// Find `<stem>.<ext>` or a tagged variant such as
/// `<stem>.cpython-312-x86_64-linux-gnu.<ext>` anywhere under `workspace`.
/// An exact name wins; otherwise the first match in path order.
pub fn locate_artifact(workspace: &Path, stem: &str, extension: &str) -> Option<PathBuf> {
    let exact = format!("{stem}.{extension}");
    let prefix = format!("{stem}.");
    let suffix = format!(".{extension}");

    let mut tagged = None;
    for entry in WalkDir::new(workspace)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if name == exact {
            return Some(entry.path().to_path_buf());
        }
        if tagged.is_none() && name.starts_with(&prefix) && name.ends_with(&suffix) {
            tagged = Some(entry.path().to_path_buf());
        }
    }
    tagged
}

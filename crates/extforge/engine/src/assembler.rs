//! Output assembly
//!
//! Copies compiled artifacts from their scratch workspaces into the output
//! tree, mirroring the source layout, and purges the run's workspaces in
//! release mode. Only the output root itself is fatal; a unit that cannot be
//! placed becomes an assembly failure in the report. Two units mapping to one
//! destination (`m.py` and `m.PY`) never overwrite each other: the first in
//! scan order is placed and the other fails.

use crate::error::{EngineError, EngineResult};
use extforge_types::{CompileJob, CompileOutcome, RunReport, SourceUnit, UnitFailure};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct OutputAssembler {
    output_root: PathBuf,
    scratch_root: PathBuf,
    run_root: PathBuf,
    release: bool,
}

impl OutputAssembler {
    pub fn new(
        output_root: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
        run_root: impl Into<PathBuf>,
        release: bool,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            scratch_root: scratch_root.into(),
            run_root: run_root.into(),
            release,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Place every successful artifact and the given resources, then purge
    /// workspaces when in release mode.
    pub async fn finalize(
        &self,
        report: &mut RunReport,
        resources: &[SourceUnit],
    ) -> EngineResult<()> {
        tokio::fs::create_dir_all(&self.output_root)
            .await
            .map_err(|e| EngineError::assembly(&self.output_root, e))?;

        let placements: Vec<(CompileJob, PathBuf)> = report
            .outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                CompileOutcome::Success { job, artifact } => Some((job.clone(), artifact.clone())),
                CompileOutcome::Failure { .. } => None,
            })
            .collect();

        // Destinations already written by this run, with the unit that wrote them.
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();

        for (job, artifact) in placements {
            if let Some(owner) = claimed.get(&job.destination) {
                let diagnostics = format!(
                    "destination {} is already produced by {owner}\n",
                    job.destination.display()
                );
                tracing::error!(unit = %job.unit, "Placement failed\n{diagnostics}");
                report.record_failure(UnitFailure::assembly(&job.unit, diagnostics));
                continue;
            }
            match self.place(&artifact, &job.destination).await {
                Ok(target) => {
                    tracing::debug!(unit = %job.unit, target = %target.display(), "Placed artifact");
                    claimed.insert(job.destination.clone(), job.unit.relative_display());
                    report.record_placement(job.destination);
                }
                Err(e) => {
                    let diagnostics = format!(
                        "cannot place {} at {}: {e}\n",
                        artifact.display(),
                        self.output_root.join(&job.destination).display()
                    );
                    tracing::error!(unit = %job.unit, "Placement failed\n{diagnostics}");
                    report.record_failure(UnitFailure::assembly(&job.unit, diagnostics));
                }
            }
        }

        for resource in resources {
            if let Some(owner) = claimed.get(&resource.relative_path) {
                let diagnostics = format!(
                    "destination {} is already produced by {owner}\n",
                    resource.relative_path.display()
                );
                tracing::error!(unit = %resource, "Resource copy failed\n{diagnostics}");
                report.record_failure(UnitFailure::assembly(resource, diagnostics));
                continue;
            }
            match self.place(&resource.path, &resource.relative_path).await {
                Ok(_) => report.record_resource(resource.relative_path.clone()),
                Err(e) => {
                    let diagnostics = format!("cannot copy resource: {e}\n");
                    tracing::error!(unit = %resource, "Resource copy failed\n{diagnostics}");
                    report.record_failure(UnitFailure::assembly(resource, diagnostics));
                }
            }
        }

        if self.release {
            self.purge().await;
        }
        Ok(())
    }

    /// Copy `from` to `<output_root>/<relative>`, creating directories.
    async fn place(&self, from: &Path, relative: &Path) -> std::io::Result<PathBuf> {
        let target = self.output_root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(from, &target).await?;
        Ok(target)
    }

    /// Remove this run's workspaces, failed units' included. The scratch
    /// root goes too when no other run is using it.
    pub async fn purge(&self) {
        match tokio::fs::remove_dir_all(&self.run_root).await {
            Ok(()) => tracing::debug!(path = %self.run_root.display(), "Removed scratch workspaces"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.run_root.display(),
                error = %e,
                "Could not remove scratch workspaces"
            ),
        }

        if tokio::fs::remove_dir(&self.scratch_root).await.is_ok() {
            tracing::debug!(path = %self.scratch_root.display(), "Removed empty scratch root");
        }
    }
}

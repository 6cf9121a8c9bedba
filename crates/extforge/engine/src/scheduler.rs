//! Job scheduler
//!
//! Fans a pre-enumerated list of units out over a bounded pool of workers.
//! Workers claim units through a shared atomic cursor, so each unit is
//! compiled by exactly one worker, and send their outcomes over a channel to
//! a single aggregator that builds the [`RunReport`].

use crate::compiler::UnitCompiler;
use crate::error::{EngineError, EngineResult};
use chrono::Utc;
use extforge_types::{CompileJob, CompileOutcome, JobId, RunId, RunReport, SourceUnit};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Turns a unit into a job with its own scratch workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlanner {
    run_root: PathBuf,
    artifact_extension: String,
}

impl JobPlanner {
    pub fn new(run_root: impl Into<PathBuf>, artifact_extension: impl Into<String>) -> Self {
        Self {
            run_root: run_root.into(),
            artifact_extension: artifact_extension.into(),
        }
    }

    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    /// Plan the job for the unit at position `id` in scan order.
    ///
    /// Workspaces are `<run_root>/<id>-<stem>`; the id prefix keeps them
    /// unique when two units share a file name.
    pub fn job(&self, id: JobId, unit: SourceUnit) -> CompileJob {
        let workspace = self.run_root.join(format!("{id}-{}", unit.stem()));
        let destination = unit.artifact_relative_path(&self.artifact_extension);
        CompileJob::new(id, unit, workspace, destination)
    }
}

/// Runs a batch of units and aggregates their outcomes.
pub struct Scheduler {
    compiler: Arc<UnitCompiler>,
    planner: Arc<JobPlanner>,
    workers: usize,
    quiet: bool,
}

impl Scheduler {
    pub fn new(
        compiler: Arc<UnitCompiler>,
        planner: Arc<JobPlanner>,
        workers: usize,
    ) -> EngineResult<Self> {
        if workers == 0 {
            return Err(EngineError::configuration(
                "worker count must be at least 1",
            ));
        }
        Ok(Self {
            compiler,
            planner,
            workers,
            quiet: false,
        })
    }

    /// Suppress per-unit success messages. Failures are always logged.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Compile every unit and return the aggregated report.
    ///
    /// A failed unit never stops the batch. The report holds exactly one
    /// outcome per unit.
    pub async fn run(&self, run_id: RunId, units: Vec<SourceUnit>) -> RunReport {
        let started_at = Utc::now();
        let units = Arc::new(units);

        tracing::debug!(
            run_id = %run_id,
            units = units.len(),
            workers = self.workers,
            "Scheduling units"
        );

        let outcomes = if self.workers == 1 {
            self.run_sequential(&units).await
        } else {
            self.run_pool(Arc::clone(&units)).await
        };
        let outcomes = self.fill_missing(&units, outcomes);

        RunReport::from_outcomes(run_id, started_at, outcomes)
    }

    async fn run_sequential(&self, units: &[SourceUnit]) -> Vec<CompileOutcome> {
        let mut outcomes = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            let job = self.planner.job(JobId::new(index), unit.clone());
            tracing::debug!(worker = 0, job = %job.id, unit = %job.unit, "Running");
            let outcome = self.compiler.compile(job).await;
            log_outcome(&outcome, self.quiet);
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_pool(&self, units: Arc<Vec<SourceUnit>>) -> Vec<CompileOutcome> {
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pool = JoinSet::new();

        for worker in 0..self.workers.min(units.len()) {
            let units = Arc::clone(&units);
            let cursor = Arc::clone(&cursor);
            let compiler = Arc::clone(&self.compiler);
            let planner = Arc::clone(&self.planner);
            let tx = tx.clone();
            let quiet = self.quiet;

            pool.spawn(async move {
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(unit) = units.get(index) else {
                        break;
                    };
                    let job = planner.job(JobId::new(index), unit.clone());
                    tracing::debug!(worker, job = %job.id, unit = %job.unit, "Running");
                    let outcome = compiler.compile(job).await;
                    log_outcome(&outcome, quiet);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        // The aggregator loop ends once every worker has dropped its sender.
        drop(tx);

        let mut outcomes = Vec::with_capacity(units.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker terminated abnormally");
            }
        }
        outcomes
    }

    /// Give every unit without an outcome a failure, so a crashed worker
    /// cannot make a unit disappear from the report.
    fn fill_missing(
        &self,
        units: &[SourceUnit],
        mut outcomes: Vec<CompileOutcome>,
    ) -> Vec<CompileOutcome> {
        let seen: BTreeSet<usize> = outcomes.iter().map(|o| o.job().id.index()).collect();
        for (index, unit) in units.iter().enumerate() {
            if seen.contains(&index) {
                continue;
            }
            let job = self.planner.job(JobId::new(index), unit.clone());
            let outcome = CompileOutcome::Failure {
                job,
                diagnostics: "worker terminated before reporting an outcome\n".to_string(),
            };
            log_outcome(&outcome, self.quiet);
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn log_outcome(outcome: &CompileOutcome, quiet: bool) {
    match outcome {
        CompileOutcome::Success { job, .. } => {
            if !quiet {
                tracing::info!(unit = %job.unit, job = %job.id, "Compiled");
            }
        }
        CompileOutcome::Failure { job, diagnostics } => {
            tracing::error!(unit = %job.unit, job = %job.id, "Compilation failed\n{diagnostics}");
        }
    }
}

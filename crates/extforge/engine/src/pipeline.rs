//! Run orchestration
//!
//! Drives one run through its phases:
//!
//! ```text
//! Scanning -> Scheduling -> Compiling -> Assembling -> Done
//! ```
//!
//! Discovery and configuration problems, a tree with nothing to compile
//! among them, end the run with an error and no report, before the output
//! root is touched. Once compilation starts the run always reaches `Done`; whether
//! it failed is read from [`RunReport::failed`].

use crate::assembler::OutputAssembler;
use crate::compiler::UnitCompiler;
use crate::config::BuildConfig;
use crate::error::{EngineError, EngineResult};
use crate::plan::{BuildPlan, InputKind};
use crate::scheduler::{JobPlanner, Scheduler};
use crate::toolchain::{self, Toolchain};
use crate::walker::{self, Discovered};
use chrono::Utc;
use extforge_types::{RunId, RunReport, SourceUnit};
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Scanning,
    Scheduling,
    Compiling,
    Assembling,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Scanning => "scanning",
            RunPhase::Scheduling => "scheduling",
            RunPhase::Compiling => "compiling",
            RunPhase::Assembling => "assembling",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Units and resources found for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub units: Vec<SourceUnit>,
    pub resources: Vec<SourceUnit>,
}

/// Runs a resolved [`BuildPlan`] against a toolchain.
pub struct Orchestrator {
    plan: BuildPlan,
    toolchain: Arc<dyn Toolchain>,
    run_id: RunId,
}

impl Orchestrator {
    pub fn new(plan: BuildPlan, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            plan,
            toolchain,
            run_id: RunId::generate(),
        }
    }

    /// Resolve `config` and build the toolchain it selects.
    pub fn from_config(config: &BuildConfig) -> EngineResult<Self> {
        let plan = BuildPlan::resolve(config)?;
        let toolchain = toolchain::from_config(&config.toolchain)?;
        Ok(Self::new(plan, toolchain))
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    /// Scratch directory of this run
    pub fn run_root(&self) -> PathBuf {
        self.plan.run_root(self.run_id)
    }

    /// Execute the run.
    pub async fn run(&self) -> EngineResult<RunReport> {
        let started_at = Utc::now();

        self.enter(RunPhase::Scanning);
        let discovery = self.discover()?;
        if discovery.units.is_empty() {
            tracing::error!(
                root = %self.plan.source_root.display(),
                extension = %self.plan.walk.source_extension,
                "No compilable units found"
            );
            return Err(EngineError::configuration("no files to compile"));
        }

        if self.plan.clean_output {
            self.clean_output().await?;
        }

        self.enter(RunPhase::Scheduling);
        let compiler = UnitCompiler::new(
            Arc::clone(&self.toolchain),
            self.plan.toolchain.clone(),
            self.plan.artifact_extension.clone(),
        );
        let planner = JobPlanner::new(self.run_root(), self.plan.artifact_extension.clone());
        let scheduler = Scheduler::new(Arc::new(compiler), Arc::new(planner), self.plan.workers)?
            .quiet(self.plan.quiet);

        self.enter(RunPhase::Compiling);
        tracing::info!(
            run_id = %self.run_id,
            units = discovery.units.len(),
            workers = self.plan.workers,
            toolchain = self.toolchain.name(),
            acceleration = %self.plan.toolchain.acceleration,
            "Compiling"
        );
        let mut report = scheduler.run(self.run_id, discovery.units).await;
        report.started_at = started_at;

        self.enter(RunPhase::Assembling);
        let assembler = OutputAssembler::new(
            &self.plan.output_root,
            &self.plan.scratch_root,
            self.run_root(),
            self.plan.release,
        );
        assembler.finalize(&mut report, &discovery.resources).await?;

        report.finish();
        self.enter(RunPhase::Done);
        tracing::info!(
            run_id = %self.run_id,
            attempted = report.attempted,
            succeeded = report.succeeded(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed_ms().unwrap_or_default(),
            "Run finished"
        );
        Ok(report)
    }

    /// Enumerate the units (and resources, when enabled) of the plan.
    pub fn discover(&self) -> EngineResult<Discovery> {
        match self.plan.input_kind {
            InputKind::File => {
                let relative = self
                    .plan
                    .input
                    .file_name()
                    .map(PathBuf::from)
                    .ok_or_else(|| EngineError::discovery(&self.plan.input, "no file name"))?;
                Ok(Discovery {
                    units: vec![SourceUnit::new(&self.plan.input, relative)],
                    resources: Vec::new(),
                })
            }
            InputKind::Directory => {
                let mut discovery = Discovery::default();
                let scan = walker::scan(
                    &self.plan.source_root,
                    &self.plan.exclusions,
                    self.plan.walk.clone(),
                )?;
                for item in scan {
                    match item? {
                        Discovered::Unit(unit) => discovery.units.push(unit),
                        Discovered::Resource(resource) => discovery.resources.push(resource),
                    }
                }
                tracing::debug!(
                    units = discovery.units.len(),
                    resources = discovery.resources.len(),
                    excluded = self.plan.exclusions.len(),
                    "Scan complete"
                );
                Ok(discovery)
            }
        }
    }

    async fn clean_output(&self) -> EngineResult<()> {
        let output_root = &self.plan.output_root;
        match tokio::fs::remove_dir_all(output_root).await {
            Ok(()) => {
                tracing::debug!(path = %output_root.display(), "Cleaned output root");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::assembly(output_root, e)),
        }
    }

    fn enter(&self, phase: RunPhase) {
        tracing::debug!(run_id = %self.run_id, phase = %phase, "Entering phase");
    }
}

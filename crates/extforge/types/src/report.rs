//! Aggregate report for one orchestrator run

use crate::ids::RunId;
use crate::outcome::{CompileOutcome, FailureStage, UnitFailure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Order-independent summary of a run.
///
/// Outcomes are kept sorted by job id and failures by relative path, so two
/// runs over the same tree compare equal regardless of which worker finished
/// first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of units dispatched to the toolchain
    pub attempted: usize,
    /// One outcome per dispatched job
    pub outcomes: Vec<CompileOutcome>,
    /// Artifacts placed in the output tree, relative to the output root
    pub placed: Vec<PathBuf>,
    /// Resource files copied verbatim, relative to the output root
    pub resources: Vec<PathBuf>,
    pub failures: Vec<UnitFailure>,
}

impl RunReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            attempted: 0,
            outcomes: Vec::new(),
            placed: Vec::new(),
            resources: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Build a report from the scheduler's outcomes.
    pub fn from_outcomes(
        run_id: RunId,
        started_at: DateTime<Utc>,
        mut outcomes: Vec<CompileOutcome>,
    ) -> Self {
        outcomes.sort_by_key(|o| o.job().id);

        let mut failures: Vec<UnitFailure> = outcomes
            .iter()
            .filter_map(|o| match o {
                CompileOutcome::Failure { job, diagnostics } => {
                    Some(UnitFailure::compile(&job.unit, diagnostics.clone()))
                }
                CompileOutcome::Success { .. } => None,
            })
            .collect();
        failures.sort();

        Self {
            run_id,
            started_at,
            finished_at: None,
            attempted: outcomes.len(),
            outcomes,
            placed: Vec::new(),
            resources: Vec::new(),
            failures,
        }
    }

    /// Units the toolchain compiled successfully
    pub fn compiled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Units that compiled and were not lost during placement
    pub fn succeeded(&self) -> usize {
        let lost = self
            .failures_at(FailureStage::Assembly)
            .filter(|f| {
                self.outcomes
                    .iter()
                    .any(|o| o.is_success() && o.unit().relative_display() == f.relative_path)
            })
            .count();
        self.compiled_count().saturating_sub(lost)
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether the run as a whole failed
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &UnitFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    pub fn record_placement(&mut self, relative: PathBuf) {
        if let Err(pos) = self.placed.binary_search(&relative) {
            self.placed.insert(pos, relative);
        }
    }

    pub fn record_resource(&mut self, relative: PathBuf) {
        if let Err(pos) = self.resources.binary_search(&relative) {
            self.resources.insert(pos, relative);
        }
    }

    pub fn record_failure(&mut self, failure: UnitFailure) {
        let pos = self.failures.binary_search(&failure).unwrap_or_else(|p| p);
        self.failures.insert(pos, failure);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once the run has finished
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::JobId;
    use crate::unit::{CompileJob, SourceUnit};

    fn job(index: usize, rel: &str) -> CompileJob {
        CompileJob::new(
            JobId::new(index),
            SourceUnit::new(format!("/src/{rel}"), rel),
            PathBuf::from(format!("/scratch/{index}")),
            PathBuf::from(rel).with_extension("so"),
        )
    }

    fn success(index: usize, rel: &str) -> CompileOutcome {
        CompileOutcome::Success {
            job: job(index, rel),
            artifact: PathBuf::from(format!("/scratch/{index}/x.so")),
        }
    }

    fn failure(index: usize, rel: &str) -> CompileOutcome {
        CompileOutcome::Failure {
            job: job(index, rel),
            diagnostics: format!("{rel}: error"),
        }
    }

    #[test]
    fn counts_follow_outcomes() {
        let report = RunReport::from_outcomes(
            RunId::generate(),
            Utc::now(),
            vec![success(1, "b.py"), failure(0, "a.py"), success(2, "c.py")],
        );
        assert_eq!(report.attempted, 3);
        assert_eq!(report.compiled_count(), 2);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(report.failed());
        assert_eq!(report.failures[0].relative_path, "a.py");
    }

    #[test]
    fn outcomes_are_sorted_by_job() {
        let report = RunReport::from_outcomes(
            RunId::generate(),
            Utc::now(),
            vec![success(2, "c.py"), success(0, "a.py"), success(1, "b.py")],
        );
        let ids: Vec<usize> = report.outcomes.iter().map(|o| o.job().id.index()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(!report.failed());
    }

    #[test]
    fn assembly_failures_reduce_successes() {
        let mut report = RunReport::from_outcomes(
            RunId::generate(),
            Utc::now(),
            vec![success(0, "a.py"), success(1, "b.py")],
        );
        let unit = report.outcomes[1].unit().clone();
        report.record_failure(UnitFailure::assembly(&unit, "permission denied"));
        assert_eq!(report.compiled_count(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures_at(FailureStage::Assembly).count(), 1);
        assert!(report.failed());
    }

    #[test]
    fn resource_failures_do_not_touch_successes() {
        let mut report = RunReport::from_outcomes(
            RunId::generate(),
            Utc::now(),
            vec![success(0, "a.py")],
        );
        let resource = SourceUnit::new("/src/data.json", "data.json");
        report.record_failure(UnitFailure::assembly(&resource, "disk full"));
        assert_eq!(report.succeeded(), 1);
        assert!(report.failed());
    }

    #[test]
    fn placements_are_deduplicated_and_sorted() {
        let mut report = RunReport::new(RunId::generate());
        report.record_placement(PathBuf::from("pkg/b.so"));
        report.record_placement(PathBuf::from("a.so"));
        report.record_placement(PathBuf::from("pkg/b.so"));
        assert_eq!(
            report.placed,
            vec![PathBuf::from("a.so"), PathBuf::from("pkg/b.so")]
        );
    }

    #[test]
    fn elapsed_is_known_after_finish() {
        let mut report = RunReport::new(RunId::generate());
        assert!(report.elapsed_ms().is_none());
        report.finish();
        assert!(report.elapsed_ms().unwrap() >= 0);
    }
}

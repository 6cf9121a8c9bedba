//! Per-unit compile outcomes and failure records

use crate::unit::{CompileJob, SourceUnit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of compiling one job. Exactly one exists per dispatched job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileOutcome {
    /// The toolchain produced an artifact inside the job's workspace
    Success { job: CompileJob, artifact: PathBuf },
    /// The toolchain failed; `diagnostics` is its output, unmodified
    Failure { job: CompileJob, diagnostics: String },
}

impl CompileOutcome {
    pub fn job(&self) -> &CompileJob {
        match self {
            Self::Success { job, .. } | Self::Failure { job, .. } => job,
        }
    }

    pub fn unit(&self) -> &SourceUnit {
        &self.job().unit
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Success { artifact, .. } => Some(artifact),
            Self::Failure { .. } => None,
        }
    }
}

/// Pipeline stage at which a unit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The toolchain rejected the unit
    Compile,
    /// The unit compiled but its artifact could not be placed
    Assembly,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Assembly => write!(f, "assembly"),
        }
    }
}

/// A failed unit as surfaced in the run report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitFailure {
    /// Unit path relative to the scanned root, `/`-separated
    pub relative_path: String,
    pub stage: FailureStage,
    pub diagnostics: String,
}

impl UnitFailure {
    pub fn compile(unit: &SourceUnit, diagnostics: impl Into<String>) -> Self {
        Self {
            relative_path: unit.relative_display(),
            stage: FailureStage::Compile,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn assembly(unit: &SourceUnit, diagnostics: impl Into<String>) -> Self {
        Self {
            relative_path: unit.relative_display(),
            stage: FailureStage::Assembly,
            diagnostics: diagnostics.into(),
        }
    }
}

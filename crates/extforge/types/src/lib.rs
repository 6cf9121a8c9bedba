//! extforge Types - Core data model for the build orchestrator
//!
//! These types are shared between the engine and the command-line front end:
//! - Source units discovered under a root directory
//! - Compile jobs planned for each unit
//! - Per-unit outcomes and the aggregate run report
//! - Resolved toolchain options (optimization, acceleration)

pub mod ids;
pub mod outcome;
pub mod report;
pub mod toolchain;
pub mod unit;

pub use ids::{JobId, RunId};
pub use outcome::{CompileOutcome, FailureStage, UnitFailure};
pub use report::RunReport;
pub use toolchain::{Acceleration, ToolchainOptions};
pub use unit::{CompileJob, SourceUnit};

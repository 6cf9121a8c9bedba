//! extforge engine
//!
//! Compiles a tree of source files into native extension artifacts:
//!
//! - [`walker`] discovers units under a root, pruning [`exclusion`] entries
//! - [`scheduler`] fans units out over a worker pool
//! - [`compiler`] drives a [`toolchain::Toolchain`] in an isolated workspace
//! - [`assembler`] mirrors artifacts into the output tree
//! - [`pipeline`] ties the phases together for one run
//!
//! Per-unit failures are data in the [`extforge_types::RunReport`]; only
//! configuration, discovery and output-root problems are [`EngineError`]s.

pub mod accel;
pub mod assembler;
pub mod compiler;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod pipeline;
pub mod plan;
pub mod scheduler;
pub mod toolchain;
pub mod walker;

pub use accel::resolve_acceleration;
pub use assembler::OutputAssembler;
pub use compiler::UnitCompiler;
pub use config::{BuildConfig, LayoutConfig, LoggingConfig, ToolchainConfig, ToolchainKind};
pub use error::{EngineError, EngineResult};
pub use exclusion::{is_excluded, ExclusionSet};
pub use pipeline::{Discovery, Orchestrator, RunPhase};
pub use plan::{BuildPlan, InputKind};
pub use scheduler::{JobPlanner, Scheduler};
pub use toolchain::{CommandToolchain, CythonToolchain, SimulatedToolchain, Toolchain};
pub use walker::{scan, scan_with_observer, Discovered, WalkOptions};

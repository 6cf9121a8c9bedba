//! Run planning
//!
//! Validates a [`BuildConfig`] and resolves it into the immutable values a
//! run works from. Every configuration and discovery error is raised here,
//! before any file is written.

use crate::accel::resolve_acceleration;
use crate::config::BuildConfig;
use crate::error::{EngineError, EngineResult};
use crate::exclusion::ExclusionSet;
use crate::walker::WalkOptions;
use extforge_types::{RunId, ToolchainOptions};
use std::path::{Path, PathBuf};

/// Highest optimization level passed to native compilers
pub const MAX_OPTIMIZATION_LEVEL: u8 = 3;

/// What the run was asked to compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// One file
    File,
    /// Every unit beneath a directory
    Directory,
}

/// Fully resolved inputs of one run
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub input_kind: InputKind,
    /// The file or directory given, made absolute
    pub input: PathBuf,
    /// Directory unit paths are made relative to
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub scratch_root: PathBuf,
    pub exclusions: ExclusionSet,
    pub workers: usize,
    pub quiet: bool,
    pub release: bool,
    pub clean_output: bool,
    pub walk: WalkOptions,
    pub artifact_extension: String,
    pub toolchain: ToolchainOptions,
}

impl BuildPlan {
    pub fn resolve(config: &BuildConfig) -> EngineResult<Self> {
        let (input_kind, given) = match (&config.source_file, &config.source_dir) {
            (Some(_), Some(_)) => {
                return Err(EngineError::configuration(
                    "give either a source file or a source directory, not both",
                ))
            }
            (None, None) => {
                return Err(EngineError::configuration(
                    "no input: give a source file or a source directory",
                ))
            }
            (Some(file), None) => (InputKind::File, file),
            (None, Some(dir)) => (InputKind::Directory, dir),
        };

        if config.workers < 1 {
            return Err(EngineError::configuration(
                "worker count must be at least 1",
            ));
        }
        if config.toolchain.optimization_level > MAX_OPTIMIZATION_LEVEL {
            return Err(EngineError::configuration(format!(
                "optimization level {} is out of range 0-{MAX_OPTIMIZATION_LEVEL}",
                config.toolchain.optimization_level
            )));
        }
        let layout = &config.layout;
        if layout.source_extension.is_empty() || layout.artifact_extension.is_empty() {
            return Err(EngineError::configuration(
                "source and artifact extensions must not be empty",
            ));
        }

        let input = absolute(given)?;
        let metadata = std::fs::metadata(&input).map_err(|e| EngineError::discovery(&input, e))?;

        let source_root = match input_kind {
            InputKind::File => {
                if !metadata.is_file() {
                    return Err(EngineError::discovery(&input, "not a file"));
                }
                let has_extension = input
                    .extension()
                    .map(|e| e.to_string_lossy().eq_ignore_ascii_case(&layout.source_extension))
                    .unwrap_or(false);
                if !has_extension {
                    return Err(EngineError::configuration(format!(
                        "{} is not a .{} file",
                        input.display(),
                        layout.source_extension
                    )));
                }
                input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| input.clone())
            }
            InputKind::Directory => {
                if !metadata.is_dir() {
                    return Err(EngineError::discovery(&input, "not a directory"));
                }
                input.clone()
            }
        };

        let output_root = absolute(&config.output_dir)?;
        let scratch_root = absolute(&config.scratch_dir)?;

        if config.clean_output && source_root.starts_with(&output_root) {
            return Err(EngineError::configuration(format!(
                "refusing to clean {}: it contains the source root",
                output_root.display()
            )));
        }

        let mut exclusions = match input_kind {
            InputKind::File => ExclusionSet::new(),
            InputKind::Directory => ExclusionSet::from_entries(
                config.exclusion_entries(),
                &[given.as_path(), source_root.as_path()],
            ),
        };
        if input_kind == InputKind::Directory {
            for generated in [&output_root, &scratch_root] {
                if let Ok(relative) = generated.strip_prefix(&source_root) {
                    if !relative.as_os_str().is_empty() {
                        tracing::debug!(path = %relative.display(), "Excluding generated directory");
                        exclusions.insert_relative(relative);
                    }
                }
            }
        }

        let toolchain = ToolchainOptions {
            acceleration: resolve_acceleration(config.toolchain.ccache.as_deref())?,
            optimization_level: config.toolchain.optimization_level,
            debug_symbols: config.toolchain.debug_symbols,
        };

        let walk = WalkOptions {
            source_extension: layout.source_extension.clone(),
            skip_file_names: layout.skip_file_names.clone(),
            include_resources: config.copy_resources,
        };

        Ok(Self {
            input_kind,
            input,
            source_root,
            output_root,
            scratch_root,
            exclusions,
            workers: config.workers,
            quiet: config.quiet,
            release: config.release,
            clean_output: config.clean_output,
            walk,
            artifact_extension: layout.artifact_extension.clone(),
            toolchain,
        })
    }

    /// Directory holding the workspaces of run `run_id`
    pub fn run_root(&self, run_id: RunId) -> PathBuf {
        self.scratch_root.join(run_id.to_string())
    }
}

fn absolute(path: &Path) -> EngineResult<PathBuf> {
    std::path::absolute(path).map_err(|e| EngineError::discovery(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use extforge_types::Acceleration;
    use std::fs;

    fn tree() -> (tempfile::TempDir, BuildConfig) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("pkg")).unwrap();
        fs::write(src.join("a.py"), "x = 1\n").unwrap();
        let config = BuildConfig {
            source_dir: Some(src),
            output_dir: dir.path().join("out"),
            scratch_dir: dir.path().join("scratch"),
            ..BuildConfig::default()
        };
        (dir, config)
    }

    fn configuration_error(config: &BuildConfig) -> String {
        match BuildPlan::resolve(config) {
            Err(EngineError::Configuration(message)) => message,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn resolves_a_directory_run() {
        let (dir, mut config) = tree();
        config.exclude = vec!["pkg/tests/, docs".into()];
        config.workers = 4;
        let plan = BuildPlan::resolve(&config).unwrap();

        assert_eq!(plan.input_kind, InputKind::Directory);
        assert_eq!(plan.source_root, dir.path().join("src"));
        assert_eq!(plan.workers, 4);
        assert!(plan.exclusions.contains("pkg/tests"));
        assert!(plan.exclusions.contains("docs"));
        assert_eq!(plan.toolchain.acceleration, Acceleration::Disabled);
        assert_eq!(plan.toolchain.optimization_level, 2);
    }

    #[test]
    fn exclusions_written_with_the_source_root_are_relative() {
        let (dir, mut config) = tree();
        let base = dir.path().to_string_lossy().into_owned();
        config.source_dir = Some(PathBuf::from(format!("{base}/./src/")));
        config.exclude = vec![
            format!("{base}/./src/pkg/tests"),
            format!("{base}/src/docs/"),
            format!("{base}/src"),
        ];
        let plan = BuildPlan::resolve(&config).unwrap();

        assert_eq!(
            plan.exclusions.iter().collect::<Vec<_>>(),
            vec!["docs", "pkg/tests"]
        );
        assert!(plan.exclusions.matches(Path::new("pkg/tests/c.py")));
    }

    #[test]
    fn both_or_neither_input_is_rejected() {
        let (dir, mut config) = tree();
        config.source_file = Some(dir.path().join("src/a.py"));
        assert!(configuration_error(&config).contains("not both"));

        config.source_file = None;
        config.source_dir = None;
        assert!(configuration_error(&config).contains("no input"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let (_dir, mut config) = tree();
        config.workers = 0;
        assert!(configuration_error(&config).contains("at least 1"));
    }

    #[test]
    fn optimization_level_is_bounded() {
        let (_dir, mut config) = tree();
        config.toolchain.optimization_level = 4;
        assert!(configuration_error(&config).contains("out of range"));
    }

    #[test]
    fn single_file_must_carry_source_extension() {
        let (dir, mut config) = tree();
        fs::write(dir.path().join("src/notes.txt"), "").unwrap();
        config.source_dir = None;
        config.source_file = Some(dir.path().join("src/notes.txt"));
        assert!(configuration_error(&config).contains("is not a .py file"));

        config.source_file = Some(dir.path().join("src/a.py"));
        let plan = BuildPlan::resolve(&config).unwrap();
        assert_eq!(plan.input_kind, InputKind::File);
        assert_eq!(plan.source_root, dir.path().join("src"));
        assert!(plan.exclusions.is_empty());
    }

    #[test]
    fn missing_input_is_a_discovery_error() {
        let (dir, mut config) = tree();
        config.source_dir = Some(dir.path().join("nope"));
        assert!(matches!(
            BuildPlan::resolve(&config),
            Err(EngineError::Discovery { .. })
        ));

        config.source_dir = Some(dir.path().join("src/a.py"));
        assert!(matches!(
            BuildPlan::resolve(&config),
            Err(EngineError::Discovery { .. })
        ));
    }

    #[test]
    fn bad_acceleration_path_is_a_configuration_error() {
        let (_dir, mut config) = tree();
        config.toolchain.ccache = Some("/nonexistent/ccache".into());
        assert!(configuration_error(&config).contains("ccache not found"));
    }

    #[test]
    fn generated_directories_inside_source_are_excluded() {
        let (dir, mut config) = tree();
        config.output_dir = dir.path().join("src/dist");
        config.scratch_dir = dir.path().join("src/.extforge");
        let plan = BuildPlan::resolve(&config).unwrap();
        assert!(plan.exclusions.contains("dist"));
        assert!(plan.exclusions.contains(".extforge"));
    }

    #[test]
    fn cleaning_an_output_that_holds_the_sources_is_refused() {
        let (dir, mut config) = tree();
        config.output_dir = dir.path().to_path_buf();
        config.clean_output = true;
        assert!(configuration_error(&config).contains("refusing to clean"));

        config.output_dir = dir.path().join("out");
        assert!(BuildPlan::resolve(&config).is_ok());
    }

    #[test]
    fn run_root_is_per_run() {
        let (dir, config) = tree();
        let plan = BuildPlan::resolve(&config).unwrap();
        let a = plan.run_root(RunId::generate());
        let b = plan.run_root(RunId::generate());
        assert_ne!(a, b);
        assert!(a.starts_with(dir.path().join("scratch")));
    }
}

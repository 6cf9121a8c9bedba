//! Build configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `EXTFORGE__*` environment variables. The command-line
//! front end applies its flags on top of the loaded value.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "extforge.toml";

/// Main build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Compile a single file
    #[serde(default)]
    pub source_file: Option<PathBuf>,

    /// Compile every unit under a directory
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Output root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Root of the per-run scratch workspaces
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Relative files or directories to leave out; entries may be comma lists
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Number of parallel workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Suppress per-unit progress
    #[serde(default)]
    pub quiet: bool,

    /// Remove scratch workspaces after assembly
    #[serde(default)]
    pub release: bool,

    /// Remove the output root before compiling
    #[serde(default)]
    pub clean_output: bool,

    /// Copy non-compilable files into the output tree
    #[serde(default)]
    pub copy_resources: bool,

    /// File naming rules
    #[serde(default)]
    pub layout: LayoutConfig,

    /// External toolchain
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_file: None,
            source_dir: None,
            output_dir: default_output_dir(),
            scratch_dir: default_scratch_dir(),
            exclude: Vec::new(),
            workers: default_workers(),
            quiet: false,
            release: false,
            clean_output: false,
            copy_resources: false,
            layout: LayoutConfig::default(),
            toolchain: ToolchainConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which files are units and how artifacts are named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Extension of compilable sources
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension given to placed artifacts
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// File names never compiled, copied verbatim instead
    #[serde(default = "default_skip_file_names")]
    pub skip_file_names: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            artifact_extension: default_artifact_extension(),
            skip_file_names: default_skip_file_names(),
        }
    }
}

/// Toolchain selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    /// Generated setuptools script driving Cython
    Cython,
    /// Arbitrary program with placeholder arguments
    Command,
}

impl Default for ToolchainKind {
    fn default() -> Self {
        ToolchainKind::Cython
    }
}

/// Toolchain configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub kind: ToolchainKind,

    /// Interpreter version suffix, e.g. `3.11` for `python3.11`
    #[serde(default)]
    pub python: Option<String>,

    /// Cython `language_level` directive
    #[serde(default = "default_language_level")]
    pub language_level: String,

    /// Native optimization level, 0-3
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u8,

    /// Keep debug symbols in artifacts
    #[serde(default)]
    pub debug_symbols: bool,

    /// Compiler cache: `auto`, a path, or unset
    #[serde(default)]
    pub ccache: Option<String>,

    /// Program to run; required for the command toolchain
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments for the command toolchain
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            kind: ToolchainKind::default(),
            python: None,
            language_level: default_language_level(),
            optimization_level: default_optimization_level(),
            debug_symbols: false,
            ccache: None,
            program: None,
            args: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".extforge")
}

fn default_workers() -> usize {
    1
}

fn default_source_extension() -> String {
    "py".to_string()
}

fn default_artifact_extension() -> String {
    if cfg!(windows) { "pyd" } else { "so" }.to_string()
}

fn default_skip_file_names() -> Vec<String> {
    vec!["__init__.py".to_string()]
}

fn default_language_level() -> String {
    "3".to_string()
}

fn default_optimization_level() -> u8 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BuildConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; without one, `extforge.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&BuildConfig::default())?);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("EXTFORGE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("exclude")
                .with_list_parse_key("layout.skip_file_names")
                .with_list_parse_key("toolchain.args"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// All exclusion entries, with comma lists split apart.
    pub fn exclusion_entries(&self) -> Vec<String> {
        self.exclude
            .iter()
            .flat_map(|e| e.split(','))
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }
}

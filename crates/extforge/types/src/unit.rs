//! Source units and the compile jobs planned for them

use crate::ids::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// One compilable input discovered under a scanned root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Absolute (or root-joined) path of the source file
    pub path: PathBuf,
    /// Path relative to the scanned root
    pub relative_path: PathBuf,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            relative_path: relative_path.into(),
        }
    }

    /// File name without its extension, e.g. `b` for `pkg/b.py`.
    pub fn stem(&self) -> String {
        self.relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Dotted module path, e.g. `pkg.b` for `pkg/b.py`.
    pub fn module_name(&self) -> String {
        let without_ext = self.relative_path.with_extension("");
        normal_segments(&without_ext).join(".")
    }

    /// Relative path rendered with `/` separators on every platform.
    pub fn relative_display(&self) -> String {
        normal_segments(&self.relative_path).join("/")
    }

    /// Relative output path: the unit's relative path with its extension
    /// replaced by `artifact_extension`.
    pub fn artifact_relative_path(&self, artifact_extension: &str) -> PathBuf {
        self.relative_path.with_extension(artifact_extension)
    }
}

impl fmt::Display for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_display())
    }
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// A unit paired with its exclusive scratch workspace and output destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileJob {
    pub id: JobId,
    pub unit: SourceUnit,
    /// Scratch directory owned by this job alone
    pub workspace: PathBuf,
    /// Destination relative to the output root
    pub destination: PathBuf,
}

impl CompileJob {
    pub fn new(id: JobId, unit: SourceUnit, workspace: PathBuf, destination: PathBuf) -> Self {
        Self {
            id,
            unit,
            workspace,
            destination,
        }
    }
}

//! Options handed to the external toolchain for every unit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Compiler-cache acceleration, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "path", rename_all = "snake_case")]
pub enum Acceleration {
    Disabled,
    /// Found by searching `PATH`
    Auto(PathBuf),
    /// Supplied by the user
    Explicit(PathBuf),
}

impl Acceleration {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Disabled => None,
            Self::Auto(p) | Self::Explicit(p) => Some(p),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl Default for Acceleration {
    fn default() -> Self {
        Self::Disabled
    }
}

impl fmt::Display for Acceleration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Auto(p) => write!(f, "auto ({})", p.display()),
            Self::Explicit(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Immutable per-run toolchain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainOptions {
    pub acceleration: Acceleration,
    /// Native optimization level, 0-3
    pub optimization_level: u8,
    /// Keep debug symbols in the produced artifact
    pub debug_symbols: bool,
}

impl Default for ToolchainOptions {
    fn default() -> Self {
        Self {
            acceleration: Acceleration::Disabled,
            optimization_level: 2,
            debug_symbols: false,
        }
    }
}

//! Compiler-cache acceleration resolution
//!
//! Resolved once while planning a run; every unit then sees the same
//! [`Acceleration`] value.

use crate::error::{EngineError, EngineResult};
use extforge_types::Acceleration;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Name of the compiler cache looked up in `auto` mode
pub const CCACHE: &str = "ccache";

/// Resolve the user's setting: absent/`off` disables, `auto` searches `PATH`,
/// anything else is an explicit path that must be an executable file.
pub fn resolve_acceleration(setting: Option<&str>) -> EngineResult<Acceleration> {
    let setting = match setting.map(str::trim) {
        None | Some("") => return Ok(Acceleration::Disabled),
        Some(s) => s,
    };

    match setting.to_ascii_lowercase().as_str() {
        "off" | "none" | "disabled" | "false" => Ok(Acceleration::Disabled),
        "auto" => match std::env::var_os("PATH").and_then(|p| find_in(CCACHE, &p)) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Found compiler cache");
                Ok(Acceleration::Auto(path))
            }
            None => {
                tracing::warn!("{CCACHE} not found on PATH, compiling without it");
                Ok(Acceleration::Disabled)
            }
        },
        _ => {
            let path = PathBuf::from(setting);
            if is_executable(&path) {
                Ok(Acceleration::Explicit(path))
            } else {
                Err(EngineError::configuration(format!(
                    "{CCACHE} not found at {}",
                    path.display()
                )))
            }
        }
    }
}

/// Search a `PATH`-style list of directories for an executable.
pub fn find_in(program: &str, path_list: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_list).find_map(|dir| {
        let candidates = if cfg!(windows) {
            vec![dir.join(format!("{program}.exe")), dir.join(program)]
        } else {
            vec![dir.join(program)]
        };
        candidates.into_iter().find(|c| is_executable(c))
    })
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

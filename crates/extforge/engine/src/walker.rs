//! Source tree discovery
//!
//! Walks a root directory in lexicographic order and yields the files to
//! compile. Each directory is listed only when the iterator reaches it, and
//! a child directory is checked against the exclusions before it is opened,
//! so an excluded directory is never read.

use crate::error::{EngineError, EngineResult};
use crate::exclusion::ExclusionSet;
use extforge_types::SourceUnit;
use std::ffi::OsString;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};
use std::vec;

/// What the walker considers compilable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Extension of compilable files, without the dot
    pub source_extension: String,
    /// File names never compiled even when they carry the source extension.
    /// They are still carried into the output verbatim.
    pub skip_file_names: Vec<String>,
    /// Also yield every other non-compilable file
    pub include_resources: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            source_extension: "py".to_string(),
            skip_file_names: vec!["__init__.py".to_string()],
            include_resources: false,
        }
    }
}

impl WalkOptions {
    /// Whether a file name is a compilable unit under these options.
    pub fn is_compilable(&self, file_name: &str) -> bool {
        if self.is_skipped(file_name) {
            return false;
        }
        Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.source_extension))
            .unwrap_or(false)
    }

    pub fn is_skipped(&self, file_name: &str) -> bool {
        self.skip_file_names.iter().any(|s| s == file_name)
    }
}

/// A file found during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    /// A file to hand to the toolchain
    Unit(SourceUnit),
    /// A file copied verbatim: a skipped name, or any other file when
    /// resources are enabled
    Resource(SourceUnit),
}

struct Listed {
    name: OsString,
    path: PathBuf,
    relative: PathBuf,
    file_type: FileType,
}

/// Lazy, single-pass scan of a source tree.
pub struct Scan<'a> {
    options: WalkOptions,
    exclusions: ExclusionSet,
    pending: Vec<vec::IntoIter<Listed>>,
    on_open: Box<dyn FnMut(&Path) + 'a>,
}

/// Scan `root`, skipping everything matched by `exclusions`.
pub fn scan<'a>(
    root: &Path,
    exclusions: &ExclusionSet,
    options: WalkOptions,
) -> EngineResult<Scan<'a>> {
    scan_with_observer(root, exclusions, options, |_| {})
}

/// Like [`scan`], but `on_open` is called with the relative path of every
/// directory the walker opens, the root being the empty path.
pub fn scan_with_observer<'a, F>(
    root: &Path,
    exclusions: &ExclusionSet,
    options: WalkOptions,
    on_open: F,
) -> EngineResult<Scan<'a>>
where
    F: FnMut(&Path) + 'a,
{
    let metadata = fs::metadata(root).map_err(|e| EngineError::discovery(root, e))?;
    if !metadata.is_dir() {
        return Err(EngineError::discovery(root, "not a directory"));
    }

    let mut scan = Scan {
        options,
        exclusions: exclusions.clone(),
        pending: Vec::new(),
        on_open: Box::new(on_open),
    };
    // An unreadable root is an error here rather than mid-scan.
    scan.open(root, PathBuf::new())?;
    Ok(scan)
}

impl Scan<'_> {
    /// Drain the scan, keeping only compilable units.
    pub fn units(self) -> EngineResult<Vec<SourceUnit>> {
        let mut units = Vec::new();
        for item in self {
            if let Discovered::Unit(unit) = item? {
                units.push(unit);
            }
        }
        Ok(units)
    }

    /// List one directory, sorted by file name, and queue its entries.
    fn open(&mut self, dir: &Path, relative: PathBuf) -> EngineResult<()> {
        (self.on_open)(&relative);

        let mut listed = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| EngineError::discovery(dir, e))? {
            let entry = entry.map_err(|e| EngineError::discovery(dir, e))?;
            let file_type = entry.file_type().map_err(|e| EngineError::discovery(entry.path(), e))?;
            let name = entry.file_name();
            listed.push(Listed {
                relative: relative.join(&name),
                path: entry.path(),
                name,
                file_type,
            });
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name));

        self.pending.push(listed.into_iter());
        Ok(())
    }

    fn classify(&self, entry: Listed) -> Option<Discovered> {
        let file_name = entry.name.to_string_lossy();
        let compilable = self.options.is_compilable(&file_name);
        let carried = self.options.is_skipped(&file_name) || self.options.include_resources;
        let unit = SourceUnit::new(entry.path, entry.relative);

        if compilable {
            tracing::trace!(unit = %unit, "Discovered unit");
            Some(Discovered::Unit(unit))
        } else if carried {
            Some(Discovered::Resource(unit))
        } else {
            None
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = EngineResult<Discovered>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.pending.last_mut()?;
            let Some(entry) = level.next() else {
                self.pending.pop();
                continue;
            };

            if self.exclusions.matches(&entry.relative) {
                tracing::trace!(path = %entry.relative.display(), "Excluded");
                continue;
            }

            // Symlinked directories are not followed; symlinked files are.
            if entry.file_type.is_dir() {
                if let Err(e) = self.open(&entry.path, entry.relative) {
                    return Some(Err(e));
                }
                continue;
            }
            let is_file = entry.file_type.is_file()
                || (entry.file_type.is_symlink() && entry.path.is_file());
            if !is_file {
                continue;
            }

            if let Some(found) = self.classify(entry) {
                return Some(Ok(found));
            }
        }
    }
}

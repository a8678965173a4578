//! Artifact storage backends.

use parking_lot::Mutex;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::Result;
use crate::step::OutputData;

/// Storage contract used by disk objects.
///
/// Implementations only need to enumerate one directory level, and to read,
/// write and remove single artifacts. They do not lock: two writers of the
/// same path race, and the last one wins.
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactStore: Send + Sync {
    /// Lists the names of the artifacts directly inside `root` whose file
    /// name matches `pattern`, in natural order. A missing `root` is empty.
    fn list(&self, root: &Path, pattern: &Regex) -> Result<Vec<String>>;

    /// Reads and decodes the artifact at `path`.
    fn read(&self, path: &Path) -> Result<OutputData>;

    /// Encodes and writes `data` to `path`, replacing any previous content.
    fn write(&self, path: &Path, data: &OutputData) -> Result<()>;

    /// Removes the artifact at `path`.
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Filesystem store encoding artifacts as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    /// Creates a new filesystem store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for FsStore {
    fn list(&self, root: &Path, pattern: &Regex) -> Result<Vec<String>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if pattern.is_match(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }

    fn read(&self, path: &Path) -> Result<OutputData> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, path: &Path, data: &OutputData) -> Result<()> {
        let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            )
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Written next to the target, then renamed over it.
        let staging = path.with_file_name(format!(".{file_name}.partial"));
        fs::write(&staging, serde_json::to_vec_pretty(data)?)?;
        fs::rename(&staging, path)?;
        debug!(path = %path.display(), "artifact written");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Mutex<BTreeMap<PathBuf, OutputData>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored paths.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.artifacts.lock().keys().cloned().collect()
    }

    /// Returns the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn list(&self, root: &Path, pattern: &Regex) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .artifacts
            .lock()
            .keys()
            .filter(|path| path.parent() == Some(root))
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .filter(|name| pattern.is_match(name))
            .map(str::to_string)
            .collect();
        names.sort_by(|a, b| natural_cmp(a, b));
        Ok(names)
    }

    fn read(&self, path: &Path) -> Result<OutputData> {
        self.artifacts.lock().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no artifact at {}", path.display()),
            )
            .into()
        })
    }

    fn write(&self, path: &Path, data: &OutputData) -> Result<()> {
        self.artifacts.lock().insert(path.to_path_buf(), data.clone());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match self.artifacts.lock().remove(path) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no artifact at {}", path.display()),
            )
            .into()),
        }
    }
}

/// Compares names so that digit runs order by value: `a2` < `a10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        let (Some(x), Some(y)) = (a.chars().next(), b.chars().next()) else {
            return a.len().cmp(&b.len());
        };

        if x.is_ascii_digit() && y.is_ascii_digit() {
            let a_end = a.find(|c: char| !c.is_ascii_digit()).unwrap_or(a.len());
            let b_end = b.find(|c: char| !c.is_ascii_digit()).unwrap_or(b.len());
            let (a_digits, a_rest) = a.split_at(a_end);
            let (b_digits, b_rest) = b.split_at(b_end);
            let a_value = a_digits.trim_start_matches('0');
            let b_value = b_digits.trim_start_matches('0');

            let ordering = a_value
                .len()
                .cmp(&b_value.len())
                .then_with(|| a_value.cmp(b_value))
                .then_with(|| a_digits.len().cmp(&b_digits.len()));
            if ordering != Ordering::Equal {
                return ordering;
            }
            a = a_rest;
            b = b_rest;
        } else {
            if x != y {
                return x.cmp(&y);
            }
            a = &a[x.len_utf8()..];
            b = &b[y.len_utf8()..];
        }
    }
}

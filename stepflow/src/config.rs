//! Configuration for pipelines and their artifact storage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// Configuration of a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum depth of a requirement chain before traversal gives up.
    #[serde(default = "default_max_recursion")]
    pub max_recursion: usize,
    /// Where and how artifacts are stored.
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_max_recursion() -> usize {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_recursion: default_max_recursion(),
            storage: StorageConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration document. Missing fields take their defaults.
    pub fn from_json_str(document: &str) -> Result<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// Sets the requirement depth ceiling.
    #[must_use]
    pub fn with_max_recursion(mut self, max_recursion: usize) -> Self {
        self.max_recursion = max_recursion;
        self
    }

    /// Sets the storage configuration.
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}

/// Artifact layout below a session's storage root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Sub-folders between the session root and the artifact files.
    #[serde(default = "default_collection")]
    pub collection: Vec<String>,
    /// File extension of artifacts, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Delete a superseded artifact once its replacement has been written.
    #[serde(default = "default_remove_stale")]
    pub remove_stale: bool,
    /// First component of every artifact name. Defaults to the pipeline name.
    #[serde(default)]
    pub file_prefix: Option<String>,
}

fn default_collection() -> Vec<String> {
    vec!["preprocessing_saves".to_string()]
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_remove_stale() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            extension: default_extension(),
            remove_stale: default_remove_stale(),
            file_prefix: None,
        }
    }
}

impl StorageConfig {
    /// Creates a storage configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection sub-folders.
    #[must_use]
    pub fn with_collection(mut self, collection: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.collection = collection.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the artifact extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets whether superseded artifacts are deleted.
    #[must_use]
    pub fn with_remove_stale(mut self, remove_stale: bool) -> Self {
        self.remove_stale = remove_stale;
        self
    }

    /// Sets the artifact file prefix.
    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = Some(prefix.into());
        self
    }

    /// Directory holding the artifacts of a session rooted at `root`.
    #[must_use]
    pub fn artifact_dir(&self, root: &Path) -> PathBuf {
        self.collection
            .iter()
            .fold(root.to_path_buf(), |dir, part| dir.join(part))
    }
}

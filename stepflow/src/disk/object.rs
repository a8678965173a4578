//! Disk objects: per-call artifact discovery, classification, load and save.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::naming::{ArtifactNaming, ArtifactStamp};
use super::store::ArtifactStore;
use crate::config::StorageConfig;
use crate::errors::{NotFoundError, Result};
use crate::session::Session;
use crate::step::{OutputData, Step};

/// The artifact of one `(session, step, extra)` triple.
///
/// A disk object inspects storage once, when it is built, and exposes the
/// outcome through its predicates. It is discarded after the call that
/// built it.
pub trait DiskObject: Send {
    /// An artifact was selected and can be read.
    fn is_loadable(&self) -> bool;

    /// The selected artifact carries another version than the requested step.
    fn version_deprecated(&self) -> bool;

    /// The selected artifact comes from a step lower in the pipe's chain.
    fn step_level_too_low(&self) -> bool;

    /// The selected artifact can stand for the requested step as is.
    fn is_matching(&self) -> bool {
        self.is_loadable() && !self.version_deprecated() && !self.step_level_too_low()
    }

    /// Name of the step that produced the selected artifact.
    fn disk_step_name(&self) -> Option<&str>;

    /// Version stamped on the selected artifact.
    fn disk_version(&self) -> Option<&str>;

    /// Path of the selected artifact.
    fn matched_path(&self) -> Option<&Path>;

    /// Human readable account of what was found and why it was (not) selected.
    fn status_message(&self) -> String;

    /// Reads the selected artifact.
    fn load(&self) -> Result<OutputData>;

    /// Writes `data` as the requested step's artifact, then removes the
    /// previously selected artifact if it lived at another path.
    fn save(&mut self, data: &OutputData) -> Result<()>;
}

/// Builds the disk objects of a pipe. This is where a pipe's storage
/// strategy is chosen.
pub trait DiskObjectFactory: Send + Sync {
    /// Builds the disk object of `step` for `session` and `extra`.
    fn disk_object(&self, session: &Session, step: &Step, extra: &str)
        -> Result<Box<dyn DiskObject>>;
}

/// Default factory, naming artifacts after the pipe and storing them in an
/// [`ArtifactStore`].
#[derive(Clone)]
pub struct StoreDiskObjectFactory {
    store: Arc<dyn ArtifactStore>,
    storage: StorageConfig,
    file_prefix: String,
}

impl StoreDiskObjectFactory {
    /// Creates a factory over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        storage: StorageConfig,
        file_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            storage,
            file_prefix: file_prefix.into(),
        }
    }
}

impl fmt::Debug for StoreDiskObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDiskObjectFactory")
            .field("storage", &self.storage)
            .field("file_prefix", &self.file_prefix)
            .finish_non_exhaustive()
    }
}

impl DiskObjectFactory for StoreDiskObjectFactory {
    fn disk_object(
        &self,
        session: &Session,
        step: &Step,
        extra: &str,
    ) -> Result<Box<dyn DiskObject>> {
        let object = StoreDiskObject::check_disk(
            Arc::clone(&self.store),
            &self.storage,
            &self.file_prefix,
            session,
            step,
            extra,
        )?;
        Ok(Box::new(object))
    }
}

/// Disk object backed by an [`ArtifactStore`].
pub struct StoreDiskObject {
    store: Arc<dyn ArtifactStore>,
    full_name: String,
    step_name: String,
    version: Option<String>,
    extra: String,
    directory: PathBuf,
    canonical_path: PathBuf,
    remove_stale: bool,
    matched_path: Option<PathBuf>,
    disk_stamp: Option<ArtifactStamp>,
    loadable: bool,
    version_deprecated: bool,
    step_level_too_low: bool,
    status: String,
}

impl StoreDiskObject {
    /// Inspects storage and classifies what it holds for `step`.
    pub fn check_disk(
        store: Arc<dyn ArtifactStore>,
        storage: &StorageConfig,
        file_prefix: &str,
        session: &Session,
        step: &Step,
        extra: &str,
    ) -> Result<Self> {
        let pipe = step.pipe()?;
        let naming = ArtifactNaming::new(
            file_prefix,
            pipe.name(),
            pipe.step_names(),
            &storage.extension,
        );
        let directory = storage.artifact_dir(session.storage_root());
        let canonical_path =
            directory.join(naming.file_name(step.step_name(), step.version(), extra));

        let mut object = Self {
            store,
            full_name: step.full_name().to_string(),
            step_name: step.step_name().to_string(),
            version: step.version().map(str::to_string),
            extra: extra.to_string(),
            directory,
            canonical_path,
            remove_stale: storage.remove_stale,
            matched_path: None,
            disk_stamp: None,
            loadable: false,
            version_deprecated: false,
            step_level_too_low: false,
            status: String::new(),
        };

        let pattern = naming.pattern(extra)?;
        debug!(
            directory = %object.directory.display(),
            pattern = pattern.as_str(),
            "searching artifacts"
        );
        let names = object.store.list(&object.directory, &pattern)?;
        debug!(found = ?names, "artifact candidates");

        let expected = ArtifactStamp {
            step_name: Some(object.step_name.clone()),
            version: object.version.clone(),
        };
        let mut partials: Vec<(String, ArtifactStamp)> = Vec::new();
        for name in names {
            let Some(stamp) = ArtifactNaming::parse(&pattern, &name) else {
                continue;
            };
            if stamp == expected {
                object.select(&name, stamp);
                object.status = format!(
                    "found {} produced by {}",
                    object.display_matched(),
                    object.describe_stamp(object.disk_stamp.as_ref())
                );
                debug!(path = %object.display_matched(), "exact artifact match");
                return Ok(object);
            }
            if !partials.iter().any(|(_, seen)| seen == &stamp) {
                partials.push((name, stamp));
            }
        }

        match partials.len() {
            0 => {
                object.status = format!(
                    "no artifact matching {} in {}",
                    pattern.as_str(),
                    object.directory.display()
                );
            }
            1 => {
                let (name, stamp) = partials.remove(0);
                warn!(
                    expected = %object.describe_stamp(Some(&expected)),
                    found = %object.describe_stamp(Some(&stamp)),
                    "single partial artifact match, make sure this is the expected artifact"
                );
                object.version_deprecated = stamp.version != object.version;
                object.step_level_too_low = match stamp.step_name.as_deref() {
                    Some(disk_step) if disk_step == object.step_name => false,
                    Some(disk_step) => match pipe.step(disk_step) {
                        Some(disk_step) => disk_step.get_level(true)? < step.get_level(true)?,
                        None => true,
                    },
                    None => true,
                };
                let found = object.describe_stamp(Some(&stamp));
                object.select(&name, stamp);
                object.status = object.partial_status(&found);
            }
            n => {
                let found: Vec<String> = partials
                    .iter()
                    .map(|(_, stamp)| object.describe_stamp(Some(stamp)))
                    .collect();
                warn!(
                    expected = %object.describe_stamp(Some(&expected)),
                    found = ?found,
                    "more than one partial artifact match, cannot choose"
                );
                object.status = format!(
                    "{n} partial artifacts found in {} ({}), none produced by {}; cannot choose one",
                    object.directory.display(),
                    found.join(", "),
                    object.describe_stamp(Some(&expected))
                );
            }
        }
        Ok(object)
    }

    fn select(&mut self, name: &str, stamp: ArtifactStamp) {
        self.matched_path = Some(self.directory.join(name));
        self.disk_stamp = Some(stamp);
        self.loadable = true;
    }

    /// Without an extra, the version slot of a name also reads another
    /// extra's tag: `P.s.left.json` is either version `left` or extra `left`.
    /// For an unversioned step the second reading cannot be ruled out.
    fn may_belong_to_other_extra(&self) -> bool {
        self.extra.trim_matches('.').is_empty()
            && self.version.is_none()
            && self
                .disk_stamp
                .as_ref()
                .is_some_and(|stamp| stamp.version.is_some())
    }

    fn display_matched(&self) -> String {
        self.matched_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn describe_stamp(&self, stamp: Option<&ArtifactStamp>) -> String {
        let Some(stamp) = stamp else {
            return "nothing".to_string();
        };
        let step = stamp.step_name.as_deref().unwrap_or("<no step>");
        match stamp.version.as_deref() {
            Some(version) => format!("step '{step}' version '{version}'"),
            None => format!("step '{step}' (unversioned)"),
        }
    }

    fn partial_status(&self, found: &str) -> String {
        let mut reasons = Vec::new();
        if self.version_deprecated {
            reasons.push(match self.version.as_deref() {
                Some(version) => format!("'{}' is now at version '{version}'", self.full_name),
                None => format!("'{}' is no longer versioned", self.full_name),
            });
        }
        if self.step_level_too_low {
            reasons.push(format!(
                "it comes from a step below '{}' in the pipe",
                self.full_name
            ));
        }
        if reasons.is_empty() {
            format!("found {} produced by {found}", self.display_matched())
        } else {
            format!(
                "found {} produced by {found}, rejected because {}",
                self.display_matched(),
                reasons.join(" and ")
            )
        }
    }
}

impl fmt::Debug for StoreDiskObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDiskObject")
            .field("step", &self.full_name)
            .field("matched_path", &self.matched_path)
            .field("disk_stamp", &self.disk_stamp)
            .field("loadable", &self.loadable)
            .field("version_deprecated", &self.version_deprecated)
            .field("step_level_too_low", &self.step_level_too_low)
            .finish_non_exhaustive()
    }
}

impl DiskObject for StoreDiskObject {
    fn is_loadable(&self) -> bool {
        self.loadable
    }

    fn version_deprecated(&self) -> bool {
        self.version_deprecated
    }

    fn step_level_too_low(&self) -> bool {
        self.step_level_too_low
    }

    fn disk_step_name(&self) -> Option<&str> {
        self.disk_stamp.as_ref()?.step_name.as_deref()
    }

    fn disk_version(&self) -> Option<&str> {
        self.disk_stamp.as_ref()?.version.as_deref()
    }

    fn matched_path(&self) -> Option<&Path> {
        self.matched_path.as_deref()
    }

    fn status_message(&self) -> String {
        self.status.clone()
    }

    fn load(&self) -> Result<OutputData> {
        let Some(path) = self.matched_path.as_deref() else {
            return Err(NotFoundError::new(&self.full_name, &self.status).into());
        };
        debug!(path = %path.display(), "loading artifact");
        self.store.read(path)
    }

    fn save(&mut self, data: &OutputData) -> Result<()> {
        debug!(path = %self.canonical_path.display(), "saving artifact");
        self.store.write(&self.canonical_path, data)?;

        let superseded = self
            .matched_path
            .take()
            .filter(|previous| *previous != self.canonical_path && self.remove_stale);
        if let Some(previous) = superseded {
            if self.may_belong_to_other_extra() {
                debug!(path = %previous.display(), "keeping artifact that may belong to another extra");
            } else {
                debug!(path = %previous.display(), "removing superseded artifact");
                if let Err(err) = self.store.remove(&previous) {
                    warn!(path = %previous.display(), error = %err, "could not remove superseded artifact");
                }
            }
        }

        self.matched_path = Some(self.canonical_path.clone());
        self.disk_stamp = Some(ArtifactStamp {
            step_name: Some(self.step_name.clone()),
            version: self.version.clone(),
        });
        self.loadable = true;
        self.version_deprecated = false;
        self.step_level_too_low = false;
        self.status = format!("saved {}", self.canonical_path.display());
        Ok(())
    }
}

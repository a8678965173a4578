//! Artifact storage: naming, discovery and staleness classification.
//!
//! This module provides:
//! - The [`ArtifactStore`] contract and its filesystem and in-memory backends
//! - The artifact [naming scheme](ArtifactNaming)
//! - [`DiskObject`]s, which decide whether a step's artifact can be reused

mod naming;
mod object;
mod store;

mod object_tests;

pub use naming::{ArtifactNaming, ArtifactStamp};
pub use object::{DiskObject, DiskObjectFactory, StoreDiskObject, StoreDiskObjectFactory};
pub use store::{natural_cmp, ArtifactStore, FsStore, MemoryStore};

#[cfg(test)]
pub(crate) use store::MockArtifactStore;

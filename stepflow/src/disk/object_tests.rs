//! Tests for artifact discovery and classification.

#[cfg(test)]
mod tests {
    use crate::config::{PipelineConfig, StorageConfig};
    use crate::disk::{ArtifactStore, MemoryStore, MockArtifactStore};
    use crate::pipe::{Pipe, PipeBuilder};
    use crate::pipeline::Pipeline;
    use crate::session::Session;
    use crate::step::StepDef;
    use crate::testing::session_at;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Pipe `P` of pipeline `exp`: `a` <- `b` <- `c`.
    fn chain_builder(store: Arc<dyn ArtifactStore>, c_version: &str) -> PipeBuilder {
        PipeBuilder::new("P")
            .store(store)
            .step(StepDef::new("a", |_, _, _| Ok(json!("a"))))
            .step(StepDef::new("b", |_, _, _| Ok(json!("b"))).requires("P.a"))
            .step(
                StepDef::new("c", |_, _, _| Ok(json!("c")))
                    .requires("P.b")
                    .version(c_version),
            )
    }

    fn chain(store: Arc<dyn ArtifactStore>, c_version: &str) -> (Pipeline, Arc<Pipe>) {
        let pipeline = Pipeline::new("exp");
        let pipe = pipeline
            .register_pipe(chain_builder(store, c_version))
            .unwrap();
        (pipeline, pipe)
    }

    fn session() -> Session {
        session_at(Path::new("/data"), "m1")
    }

    fn artifact(name: &str) -> PathBuf {
        StorageConfig::default()
            .artifact_dir(session().storage_root())
            .join(name)
    }

    #[test]
    fn test_nothing_on_disk() {
        let (_pipeline, pipe) = chain(Arc::new(MemoryStore::new()), "");
        let disk = pipe.step("a").unwrap().disk_object(&session(), None).unwrap();

        assert!(!disk.is_loadable());
        assert!(!disk.is_matching());
        assert_eq!(disk.matched_path(), None);
        assert!(disk.status_message().contains("no artifact"));
        assert!(disk.load().unwrap_err().is_not_found());
    }

    #[test]
    fn test_exact_match_after_save() {
        let (_pipeline, pipe) = chain(Arc::new(MemoryStore::new()), "");
        let step = pipe.step("b").unwrap();

        let mut disk = step.disk_object(&session(), None).unwrap();
        disk.save(&json!({"x": 1})).unwrap();
        assert!(disk.is_matching());

        let disk = step.disk_object(&session(), None).unwrap();
        assert!(disk.is_matching());
        assert_eq!(disk.disk_step_name(), Some("b"));
        assert_eq!(disk.disk_version(), None);
        assert_eq!(disk.matched_path(), Some(artifact("exp.P.b.json").as_path()));
        assert_eq!(disk.load().unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_lower_step_artifact_is_too_low() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.a.json"), &json!("a")).unwrap();
        let (_pipeline, pipe) = chain(store, "");

        let disk = pipe.step("c").unwrap().disk_object(&session(), None).unwrap();

        assert!(disk.is_loadable());
        assert!(disk.step_level_too_low());
        assert!(!disk.version_deprecated());
        assert!(!disk.is_matching());
        assert_eq!(disk.disk_step_name(), Some("a"));
        assert!(disk.status_message().contains("rejected"));
    }

    #[test]
    fn test_higher_step_artifact_stands_for_lower_step() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.c.json"), &json!("from c")).unwrap();
        let (_pipeline, pipe) = chain(store, "");

        let disk = pipe.step("a").unwrap().disk_object(&session(), None).unwrap();

        assert!(disk.is_matching());
        assert_eq!(disk.disk_step_name(), Some("c"));
        assert_eq!(disk.load().unwrap(), json!("from c"));
    }

    #[test]
    fn test_other_version_is_deprecated() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.c.1.json"), &json!("v1")).unwrap();
        let (_pipeline, pipe) = chain(store, "2");

        let disk = pipe.step("c").unwrap().disk_object(&session(), None).unwrap();

        assert!(disk.is_loadable());
        assert!(disk.version_deprecated());
        assert!(!disk.step_level_too_low());
        assert!(!disk.is_matching());
        assert_eq!(disk.disk_version(), Some("1"));
    }

    #[test]
    fn test_versions_compare_by_equality_only() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.c.10.json"), &json!("v10")).unwrap();
        let (_pipeline, pipe) = chain(store, "2");

        let disk = pipe.step("c").unwrap().disk_object(&session(), None).unwrap();
        assert!(disk.version_deprecated());
    }

    #[test]
    fn test_unversioned_artifact_of_versioned_step_is_deprecated() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.c.json"), &json!("old")).unwrap();
        let (_pipeline, pipe) = chain(store, "2");

        let disk = pipe.step("c").unwrap().disk_object(&session(), None).unwrap();

        assert!(disk.is_loadable());
        assert!(disk.version_deprecated());
        assert_eq!(disk.disk_version(), None);
    }

    #[test]
    fn test_several_partial_matches_are_ambiguous() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.a.json"), &json!("a")).unwrap();
        store.write(&artifact("exp.P.b.json"), &json!("b")).unwrap();
        let (_pipeline, pipe) = chain(store, "");

        let disk = pipe.step("c").unwrap().disk_object(&session(), None).unwrap();

        assert!(!disk.is_loadable());
        assert_eq!(disk.matched_path(), None);
        assert!(disk.status_message().contains("cannot choose"));
        assert!(disk.load().unwrap_err().is_not_found());
    }

    #[test]
    fn test_exact_match_wins_over_partials() {
        let store = Arc::new(MemoryStore::new());
        for name in ["exp.P.a.json", "exp.P.b.json", "exp.P.c.json"] {
            store.write(&artifact(name), &json!(name)).unwrap();
        }
        let (_pipeline, pipe) = chain(store, "");

        let disk = pipe.step("c").unwrap().disk_object(&session(), None).unwrap();

        assert!(disk.is_matching());
        assert_eq!(disk.load().unwrap(), json!("exp.P.c.json"));
    }

    #[test]
    fn test_save_replaces_superseded_artifact() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.a.json"), &json!("a")).unwrap();
        let (_pipeline, pipe) = chain(store.clone(), "");

        let mut disk = pipe.step("b").unwrap().disk_object(&session(), None).unwrap();
        disk.save(&json!("b")).unwrap();

        assert_eq!(store.paths(), vec![artifact("exp.P.b.json")]);
        assert_eq!(disk.disk_step_name(), Some("b"));
    }

    #[test]
    fn test_save_keeps_superseded_artifact_when_configured() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.a.json"), &json!("a")).unwrap();
        let config = PipelineConfig::new()
            .with_storage(StorageConfig::new().with_remove_stale(false));
        let pipeline = Pipeline::with_config("exp", config);
        let pipe = pipeline.register_pipe(chain_builder(store.clone(), "")).unwrap();

        let mut disk = pipe.step("b").unwrap().disk_object(&session(), None).unwrap();
        disk.save(&json!("b")).unwrap();

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_file_prefix_from_config() {
        let store = Arc::new(MemoryStore::new());
        let config = PipelineConfig::new()
            .with_storage(StorageConfig::new().with_file_prefix("study"));
        let pipeline = Pipeline::with_config("exp", config);
        let pipe = pipeline.register_pipe(chain_builder(store.clone(), "")).unwrap();

        pipe.step("a").unwrap().save(&session(), &json!(1), None).unwrap();

        assert_eq!(store.paths(), vec![artifact("study.P.a.json")]);
    }

    #[test]
    fn test_extra_isolates_artifacts() {
        let store = Arc::new(MemoryStore::new());
        let (_pipeline, pipe) = chain(store.clone(), "");
        let step = pipe.step("a").unwrap();

        step.save(&session(), &json!("left"), Some("left")).unwrap();

        assert_eq!(store.paths(), vec![artifact("exp.P.a.left.json")]);
        // Without an extra the tag reads as a version, so the artifact is seen but rejected.
        assert!(!step.disk_object(&session(), None).unwrap().is_matching());
        assert!(!step.disk_object(&session(), Some("right")).unwrap().is_loadable());
        assert!(step.disk_object(&session(), Some("left")).unwrap().is_matching());
    }

    #[test]
    fn test_saving_without_extra_keeps_other_extra_artifact() {
        let store = Arc::new(MemoryStore::new());
        let (_pipeline, pipe) = chain(store.clone(), "");
        let step = pipe.step("a").unwrap();
        step.save(&session(), &json!("left"), Some("left")).unwrap();

        step.save(&session(), &json!("default"), None).unwrap();

        assert_eq!(
            store.paths(),
            vec![artifact("exp.P.a.json"), artifact("exp.P.a.left.json")]
        );
        assert_eq!(step.load(&session(), Some("left")).unwrap(), json!("left"));
        assert_eq!(step.load(&session(), None).unwrap(), json!("default"));
    }

    #[test]
    fn test_versioned_step_still_replaces_older_version() {
        let store = Arc::new(MemoryStore::new());
        store.write(&artifact("exp.P.c.1.json"), &json!("v1")).unwrap();
        let (_pipeline, pipe) = chain(store.clone(), "2");

        pipe.step("c").unwrap().save(&session(), &json!("v2"), None).unwrap();

        assert_eq!(store.paths(), vec![artifact("exp.P.c.2.json")]);
    }

    #[test]
    fn test_failed_removal_of_superseded_artifact_is_not_fatal() {
        let mut store = MockArtifactStore::new();
        store
            .expect_list()
            .returning(|_, _| Ok(vec!["exp.P.a.json".to_string()]));
        store.expect_write().times(1).returning(|_, _| Ok(()));
        store.expect_remove().times(1).returning(|_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
        });
        let (_pipeline, pipe) = chain(Arc::new(store), "");

        let mut disk = pipe.step("b").unwrap().disk_object(&session(), None).unwrap();
        assert!(disk.step_level_too_low());

        disk.save(&json!("b")).unwrap();
        assert!(disk.is_matching());
        assert_eq!(disk.matched_path(), Some(artifact("exp.P.b.json").as_path()));
    }

    #[test]
    fn test_failed_write_keeps_previous_artifact() {
        let mut store = MockArtifactStore::new();
        store
            .expect_list()
            .returning(|_, _| Ok(vec!["exp.P.a.json".to_string()]));
        store.expect_write().times(1).returning(|_, _| {
            Err(io::Error::new(io::ErrorKind::Other, "disk full").into())
        });
        store.expect_remove().never();
        let (_pipeline, pipe) = chain(Arc::new(store), "");

        let mut disk = pipe.step("b").unwrap().disk_object(&session(), None).unwrap();

        assert!(disk.save(&json!("b")).is_err());
        assert_eq!(disk.disk_step_name(), Some("a"));
    }
}

//! Artifact file naming.
//!
//! Artifacts are named `<prefix>.<pipe>.<step>[.<version>][.<extra>].<ext>`.
//! The matching pattern accepts the name of any step of the pipe, so that
//! an artifact written by an earlier or later step of the same chain is
//! still seen and can be classified as stale instead of being invisible.

use regex::Regex;

use crate::errors::Result;

/// The `(step, version)` stamp parsed out of an artifact file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStamp {
    /// Step that produced the artifact, if the name carries one.
    pub step_name: Option<String>,
    /// Version the producing step had, if the name carries one.
    pub version: Option<String>,
}

/// Naming scheme of the artifacts of one pipe.
#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    prefix: String,
    pipe_name: String,
    step_names: Vec<String>,
    extension: String,
}

impl ArtifactNaming {
    /// Creates the naming scheme of a pipe.
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        pipe_name: impl Into<String>,
        step_names: impl IntoIterator<Item = impl Into<String>>,
        extension: impl Into<String>,
    ) -> Self {
        let mut step_names: Vec<String> = step_names.into_iter().map(Into::into).collect();
        step_names.sort();
        Self {
            prefix: prefix.into(),
            pipe_name: pipe_name.into(),
            step_names,
            extension: extension.into(),
        }
    }

    /// Canonical file name for a step, version and extra.
    #[must_use]
    pub fn file_name(&self, step_name: &str, version: Option<&str>, extra: &str) -> String {
        let mut name = format!("{}.{}.{}", self.prefix, self.pipe_name, step_name);
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            name.push('.');
            name.push_str(version);
        }
        let extra = normalize_extra(extra);
        if !extra.is_empty() {
            name.push('.');
            name.push_str(extra);
        }
        name.push('.');
        name.push_str(&self.extension);
        name
    }

    /// Pattern matching every artifact of the pipe for the given extra.
    pub fn pattern(&self, extra: &str) -> Result<Regex> {
        let steps = self
            .step_names
            .iter()
            .map(|name| format!("(?:{})", regex::escape(name)))
            .collect::<Vec<_>>()
            .join("|");
        let extra = normalize_extra(extra);
        let extra = if extra.is_empty() {
            String::new()
        } else {
            format!(r"\.{}", regex::escape(extra))
        };

        let pattern = format!(
            r"^{prefix}\.{pipe}(?:\.(?P<step_name>{steps})(?:\.(?P<version>[^.]*))?)?{extra}\.{ext}$",
            prefix = regex::escape(&self.prefix),
            pipe = regex::escape(&self.pipe_name),
            ext = regex::escape(&self.extension),
        );
        Ok(Regex::new(&pattern)?)
    }

    /// Parses the stamp of a file name with a pattern from [`Self::pattern`].
    #[must_use]
    pub fn parse(pattern: &Regex, file_name: &str) -> Option<ArtifactStamp> {
        let captures = pattern.captures(file_name)?;
        let group = |name: &str| {
            captures
                .name(name)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        };
        Some(ArtifactStamp {
            step_name: group("step_name"),
            version: group("version"),
        })
    }
}

fn normalize_extra(extra: &str) -> &str {
    extra.trim_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn naming() -> ArtifactNaming {
        ArtifactNaming::new("study", "Trials", ["raw", "filtered"], "json")
    }

    fn stamp(step: Option<&str>, version: Option<&str>) -> ArtifactStamp {
        ArtifactStamp {
            step_name: step.map(str::to_string),
            version: version.map(str::to_string),
        }
    }

    #[test]
    fn test_file_name() {
        let naming = naming();
        assert_eq!(naming.file_name("raw", None, ""), "study.Trials.raw.json");
        assert_eq!(naming.file_name("raw", Some("2"), ""), "study.Trials.raw.2.json");
        assert_eq!(
            naming.file_name("raw", Some("2"), ".ch1."),
            "study.Trials.raw.2.ch1.json"
        );
        assert_eq!(naming.file_name("raw", Some(""), "ch1"), "study.Trials.raw.ch1.json");
    }

    #[test]
    fn test_pattern_recognises_sibling_steps() {
        let naming = naming();
        let pattern = naming.pattern("").unwrap();

        assert_eq!(
            ArtifactNaming::parse(&pattern, "study.Trials.filtered.json"),
            Some(stamp(Some("filtered"), None))
        );
        assert_eq!(
            ArtifactNaming::parse(&pattern, "study.Trials.raw.3.json"),
            Some(stamp(Some("raw"), Some("3")))
        );
        assert_eq!(
            ArtifactNaming::parse(&pattern, "study.Trials.json"),
            Some(stamp(None, None))
        );
        assert_eq!(ArtifactNaming::parse(&pattern, "study.Other.raw.json"), None);
        assert_eq!(ArtifactNaming::parse(&pattern, "study.Trials.unknown.json"), None);
        assert_eq!(ArtifactNaming::parse(&pattern, "xstudy.Trials.raw.json"), None);
    }

    #[test]
    fn test_pattern_with_extra() {
        let naming = naming();
        let pattern = naming.pattern("ch1").unwrap();

        assert_eq!(
            ArtifactNaming::parse(&pattern, "study.Trials.raw.ch1.json"),
            Some(stamp(Some("raw"), None))
        );
        assert_eq!(
            ArtifactNaming::parse(&pattern, "study.Trials.raw.2.ch1.json"),
            Some(stamp(Some("raw"), Some("2")))
        );
        assert_eq!(ArtifactNaming::parse(&pattern, "study.Trials.raw.json"), None);
        assert_eq!(ArtifactNaming::parse(&pattern, "study.Trials.raw.ch2.json"), None);
    }

    #[test]
    fn test_pattern_roundtrips_canonical_names() {
        let naming = naming();
        for (version, extra) in [(None, ""), (Some("v1"), ""), (None, "left"), (Some("7"), "left")] {
            let name = naming.file_name("filtered", version, extra);
            let pattern = naming.pattern(extra).unwrap();
            assert_eq!(
                ArtifactNaming::parse(&pattern, &name),
                Some(stamp(Some("filtered"), version))
            );
        }
    }
}

//! Session identity: one unit of data flowing through a pipeline.
//!
//! A session is identified by a subject, a date and an optional sequence
//! number, and resolves to a storage root where the artifacts of every
//! step live.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default separator between alias components.
pub const DEFAULT_ALIAS_SEPARATOR: &str = "_";

/// Default zero padding of the session number in aliases.
pub const DEFAULT_NUMBER_WIDTH: usize = 3;

/// A session: identity plus storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    /// Subject the session belongs to.
    pub subject: String,
    /// Acquisition date.
    pub date: NaiveDate,
    /// Sequence number within the subject and date, if any.
    pub number: Option<u32>,
    /// Storage root of the session.
    pub path: PathBuf,
}

impl Session {
    /// Creates a new session.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        date: NaiveDate,
        number: Option<u32>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            subject: subject.into(),
            date,
            number,
            path: path.into(),
        }
    }

    /// Rewrites the storage root as `<root>/<subject>/<date>/<number>`.
    #[must_use]
    pub fn with_auto_path(mut self) -> Self {
        let mut path = self
            .path
            .join(&self.subject)
            .join(self.date.format("%Y-%m-%d").to_string());
        let number = self.padded_number(DEFAULT_NUMBER_WIDTH);
        if !number.is_empty() {
            path = path.join(number);
        }
        self.path = path;
        self
    }

    /// Storage root of the session.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.path
    }

    /// Stable identity string, the default alias.
    #[must_use]
    pub fn identity(&self) -> String {
        self.alias(DEFAULT_ALIAS_SEPARATOR, DEFAULT_NUMBER_WIDTH, None)
    }

    /// Builds an alias such as `mouse12_2024-01-31_003`.
    ///
    /// `date_format` is a chrono format string; ISO dates are used when absent.
    #[must_use]
    pub fn alias(&self, separator: &str, number_width: usize, date_format: Option<&str>) -> String {
        let date = match date_format {
            Some(format) => self.date.format(format).to_string(),
            None => self.date.to_string(),
        };
        let number = self.padded_number(number_width);

        let mut alias = format!("{}{separator}{date}", self.subject);
        if !number.is_empty() {
            alias.push_str(separator);
            alias.push_str(&number);
        }
        alias
    }

    fn padded_number(&self, width: usize) -> String {
        self.number
            .map(|n| format!("{n:0width$}"))
            .unwrap_or_default()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s#{}", self.identity())
    }
}

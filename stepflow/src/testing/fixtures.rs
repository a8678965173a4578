//! Session fixtures.

use chrono::NaiveDate;
use std::path::Path;

use crate::session::Session;

/// The acquisition date of fixture sessions, 2024-01-15.
#[must_use]
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default()
}

/// A session of `subject` stored under `root/<subject>/2024-01-15/001`.
#[must_use]
pub fn session_at(root: &Path, subject: &str) -> Session {
    Session::new(subject, test_date(), Some(1), root).with_auto_path()
}

//! Artifact filenames
//!
//! Builds the `<prefix>-<subjectId>-<date>-<time>` basenames the collection
//! server groups recordings by. Date and time are UTC; colons are replaced so
//! the name is valid on every filesystem.

use chrono::{DateTime, Utc};

/// Build an artifact basename for the given subject and timestamp.
///
/// The result has the form `<prefix>-<subjectId>-<YYYY-MM-DD>-<HH-MM-SS>`,
/// with filesystem-hostile characters in the inputs replaced by `_`.
pub fn artifact_basename(prefix: &str, subject_id: &str, timestamp: DateTime<Utc>) -> String {
    let date = timestamp.format("%Y-%m-%d");
    let time = timestamp.format("%H-%M-%S");
    let name = format!("{}-{}-{}-{}", prefix, subject_id, date, time);
    // Sanitize for filesystem: replace invalid chars
    name.replace(
        |c: char| matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'),
        "_",
    )
}

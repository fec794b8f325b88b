//! Records persisted in the wall's JSON data files.
//!
//! Field names are part of the on-disk format and of the HTTP API, so every
//! struct serializes with exactly the keys the frontend reads.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Display name given to messages submitted without one.
pub const ANONYMOUS_NAME: &str = "匿名心动者";

/// URL prefix under which stored images are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Maximum accepted image size in bytes (10 MiB).
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// File name of the message collection inside the data directory.
pub const LOVE_DATA_FILE: &str = "loveData.json";

/// File name of the album collection inside the data directory.
pub const ALBUM_DATA_FILE: &str = "albumData.json";

// ---------------------------------------------------------------------------
// LoveMessage
// ---------------------------------------------------------------------------

/// A confession posted to the wall.  Never mutated once stored.
///
/// Older data files hold whatever body the poster sent, so loading is
/// lenient: a missing, `null` or blank `name` reads as [`ANONYMOUS_NAME`],
/// a `null` `time` as empty, and any other keys are carried along in
/// `extra` and written back untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoveMessage {
    /// Display name, [`ANONYMOUS_NAME`] when the poster left it blank.
    #[serde(default = "anonymous_name", deserialize_with = "name_or_anonymous")]
    pub name: String,
    /// Message body, never empty.
    pub content: String,
    /// Display-formatted creation time.
    #[serde(default, deserialize_with = "string_or_empty")]
    pub time: String,
    /// Keys outside the known three.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn anonymous_name() -> String {
    ANONYMOUS_NAME.to_string()
}

fn name_or_anonymous<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(anonymous_name))
}

fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a message submission.  Every field is optional on the wire so
/// that a missing `content` surfaces as a validation error rather than a
/// deserialization failure.  Extra keys are stored along with the message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLoveMessage {
    pub name: Option<String>,
    pub content: Option<String>,
    pub time: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewLoveMessage {
    /// Validate the submission and fill in defaults.
    ///
    /// `now` supplies the timestamp used when the caller sent no `time`.
    pub fn resolve(self, now: impl FnOnce() -> String) -> Result<LoveMessage> {
        let content = match self.content {
            Some(c) if !c.trim().is_empty() => c,
            _ => {
                return Err(StoreError::Validation(
                    "Message content must not be empty".to_string(),
                ))
            }
        };

        let name = match self.name {
            Some(n) if !n.trim().is_empty() => n,
            _ => anonymous_name(),
        };

        let time = match self.time {
            Some(t) if !t.trim().is_empty() => t,
            _ => now(),
        };

        Ok(LoveMessage {
            name,
            content,
            time,
            extra: self.extra,
        })
    }
}

// ---------------------------------------------------------------------------
// AlbumEntry
// ---------------------------------------------------------------------------

/// Metadata for one uploaded photo.  Identified for deletion by its current
/// position in the album, not by any field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlbumEntry {
    /// Server-generated unique name of the stored file.
    pub filename: String,
    /// Relative URL the client fetches the image from.
    pub path: String,
    /// Display-formatted upload time.
    pub time: String,
}

impl AlbumEntry {
    pub fn new(filename: String, time: String) -> Self {
        let path = format!("{UPLOADS_URL_PREFIX}/{filename}");
        Self {
            filename,
            path,
            time,
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Format a moment the way the wall displays it: `2024/2/14 09:05:00`.
pub fn display_timestamp<Tz>(moment: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    moment.format("%Y/%-m/%-d %H:%M:%S").to_string()
}

/// Current local time in display format.
pub fn now_display() -> String {
    display_timestamp(&Local::now())
}

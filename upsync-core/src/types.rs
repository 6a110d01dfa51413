//! Domain types shared by the sync engine and the CLI.
//!
//! The [`Manifest`] is the only state that survives between runs. Its serde
//! shape is the wire format read and written by every previous run, so the
//! field names (`prev`, `current`, `uploadTime`) must not change.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed file name of the manifest document under the upload path.
pub const MANIFEST_FILENAME: &str = "__upsync__manifest.json";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of one build output, e.g. `js/app.3f9a1c.js`.
///
/// Opaque apart from being joinable onto a POSIX path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(pub String);

impl ArtifactName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ArtifactName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The artifacts chosen for release in one run.
pub type Selection = BTreeSet<ArtifactName>;

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Two-generation sync history stored next to the artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// `current` as written by the run before the last one.
    #[serde(rename = "prev", default)]
    pub previous: BTreeSet<ArtifactName>,
    /// Selection of the most recent completed run.
    #[serde(default)]
    pub current: BTreeSet<ArtifactName>,
    /// `None` means "never synced" and is encoded as `""`.
    #[serde(
        rename = "uploadTime",
        default,
        serialize_with = "serialize_upload_time",
        deserialize_with = "deserialize_upload_time"
    )]
    pub upload_time: Option<DateTime<Utc>>,
}

impl Manifest {
    /// History used when nothing was ever synced or the document is unreadable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The manifest a completed run writes: the window slides by one generation.
    pub fn advance(&self, selection: Selection, synced_at: DateTime<Utc>) -> Self {
        Self {
            previous: self.current.clone(),
            current: selection,
            upload_time: Some(synced_at),
        }
    }

    pub fn is_never_synced(&self) -> bool {
        self.upload_time.is_none() && self.previous.is_empty() && self.current.is_empty()
    }
}

fn serialize_upload_time<S>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => s.serialize_str(""),
    }
}

/// Any shape `uploadTime` has been seen in. Unknown shapes are ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUploadTime {
    Text(String),
    Millis(i64),
    Other(IgnoredAny),
}

/// Lenient: an unreadable value reads as `None` and the rest of the document
/// still parses.
fn deserialize_upload_time<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<RawUploadTime>::deserialize(d)? {
        Some(RawUploadTime::Text(raw)) if !raw.trim().is_empty() => {
            let ts = parse_upload_time(raw.trim());
            if ts.is_none() {
                tracing::warn!(upload_time = %raw, "unreadable manifest uploadTime; ignoring it");
            }
            ts
        }
        Some(RawUploadTime::Millis(ms)) => Utc.timestamp_millis_opt(ms).single(),
        Some(RawUploadTime::Text(_)) | Some(RawUploadTime::Other(_)) | None => None,
    };
    Ok(parsed)
}

/// RFC 3339 first, then ISO-8601 local forms read as UTC.
fn parse_upload_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

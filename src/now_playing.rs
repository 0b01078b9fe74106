//! The "now playing" record and its wire format.
//!
//! Stations publish what is on air as a small JSON document. Every field is
//! optional and independently defaulted: a field that is missing, `null`,
//! empty or of the wrong type is replaced by a default instead of failing the
//! whole document.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "title": "Sweet Caroline",
//!     "artist": "Neil Diamond",
//!     "album": "Brother Love's Travelling Salvation Show",
//!     "artwork_url": "https://example.com/covers/123.jpg",
//!     "duration": 203,
//!     "started_at": "2026-10-16T14:03:00Z"
//! }
//! ```

use std::{fmt, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnError};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use url::Url;

/// Snapshot of what is currently on air.
///
/// A `NowPlaying` is never mutated: every update replaces the previous
/// snapshot as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NowPlaying {
    pub song: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<Url>,
    pub duration: Option<Duration>,
    pub start_time: OffsetDateTime,
}

impl NowPlaying {
    /// Record shown before the first poll completes.
    #[must_use]
    pub fn loading(station: &str) -> Self {
        Self {
            song: "Loading...".to_owned(),
            artist: station.to_owned(),
            album: Defaults::ALBUM.to_owned(),
            artwork: None,
            duration: None,
            start_time: OffsetDateTime::now_utc(),
        }
    }
}

impl fmt::Display for NowPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.song, self.artist)
    }
}

/// Values substituted for missing fields, and the record used when no
/// metadata could be fetched at all.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Defaults {
    pub station: String,
    pub fallback_song: String,
    pub fallback_album: String,
}

impl Defaults {
    pub const SONG: &'static str = "Unknown Song";
    pub const ALBUM: &'static str = "Live Stream";

    /// Record published when the metadata source fails.
    #[must_use]
    pub fn fallback(&self) -> NowPlaying {
        NowPlaying {
            song: self.fallback_song.clone(),
            artist: self.station.clone(),
            album: self.fallback_album.clone(),
            artwork: None,
            duration: None,
            start_time: OffsetDateTime::now_utc(),
        }
    }

    /// Maps a payload into a record, defaulting each field on its own.
    #[must_use]
    pub fn apply(&self, payload: Payload) -> NowPlaying {
        let text = |field: Option<String>| field.filter(|value| !value.trim().is_empty());

        NowPlaying {
            song: text(payload.title).unwrap_or_else(|| Self::SONG.to_owned()),
            artist: text(payload.artist).unwrap_or_else(|| self.station.clone()),
            album: text(payload.album).unwrap_or_else(|| Self::ALBUM.to_owned()),
            artwork: text(payload.artwork_url).and_then(|url| Url::parse(&url).ok()),
            duration: payload
                .duration
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            start_time: payload
                .started_at
                .and_then(|started_at| OffsetDateTime::parse(&started_at, &Rfc3339).ok())
                .unwrap_or_else(OffsetDateTime::now_utc),
        }
    }
}

/// Now playing document as published by the station.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Payload {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub title: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub artist: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub album: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub artwork_url: Option<String>,

    /// Track length in seconds.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub duration: Option<f64>,

    /// RFC 3339 timestamp of when the track started.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub started_at: Option<String>,
}

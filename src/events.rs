//! Events emitted by the player.
//!
//! The [`Player`](crate::player::Player) reports every state transition as
//! an [`Event`]. The [`Session`](crate::session::Session) turns these into
//! notifications for observers.
//!
//! # Example
//!
//! ```rust
//! use onair::events::Event;
//!
//! fn describe(event: &Event) -> &str {
//!     match event {
//!         Event::Playing => "on air",
//!         Event::Paused => "paused",
//!         Event::Reconnecting => "reconnecting",
//!         Event::Alert(message) => message,
//!         _ => "idle",
//!     }
//! }
//! ```

use std::fmt;

/// State transitions of the player.
///
/// Events fall into three categories:
///
/// Connection Events:
/// * [`Loading`](Self::Loading) - A connection is being opened
/// * [`Reconnecting`](Self::Reconnecting) - The stream dropped and will be
///   reopened shortly
/// * [`Stopped`](Self::Stopped) - The connection was released on request
///
/// Playback Events:
/// * [`Playing`](Self::Playing) - Audio is playing
/// * [`Paused`](Self::Paused) - Audio is paused
///
/// User Messages:
/// * [`Alert`](Self::Alert) - Something the user should be told about
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Opening a connection to the stream.
    Loading,

    /// Playback has started or resumed.
    Playing,

    /// Playback has paused, by request or by the platform.
    Paused,

    /// The stream terminated unexpectedly; a reconnect is scheduled.
    Reconnecting,

    /// The connection was released and the player is idle.
    Stopped,

    /// A message to show to the user, like a failure to connect.
    Alert(String),
}

impl Event {
    /// Whether audio is playing after this event.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Stopped => write!(f, "stopped"),
            Self::Alert(message) => write!(f, "alert: {message}"),
        }
    }
}

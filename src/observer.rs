//! Built-in observers.
//!
//! * [`MediaSession`] logs what is on air, like a platform now-playing
//!   surface would display it
//! * [`Notification`] renders the persistent playback notification

use std::sync::{Mutex, PoisonError};

use crate::{now_playing::NowPlaying, publisher::Observer};

/// Logs track changes at `info` level and repeats at `debug` level.
#[derive(Debug, Default)]
pub struct MediaSession {
    last: Mutex<Option<(NowPlaying, bool)>>,
}

impl MediaSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for MediaSession {
    fn now_playing(&self, now_playing: &NowPlaying, is_playing: bool) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let current = (now_playing.clone(), is_playing);
        if last.as_ref() == Some(&current) {
            debug!("now playing: {now_playing}");
            return;
        }

        let state = if is_playing { "playing" } else { "paused" };
        match now_playing.duration {
            Some(duration) => info!(
                "{state}: {now_playing} ({}) [{}s]",
                now_playing.album,
                duration.as_secs()
            ),
            None => info!("{state}: {now_playing} ({})", now_playing.album),
        }
        *last = Some(current);
    }

    fn alert(&self, message: &str) {
        error!("{message}");
    }

    fn attach(&self) {
        debug!("media session attached");
    }

    fn detach(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("media session detached");
    }
}

/// Title and body of a playback notification.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rendered {
    pub title: String,
    pub body: String,
    pub is_playing: bool,
}

/// Keeps the playback notification up to date.
#[derive(Debug)]
pub struct Notification {
    title: String,
    current: Mutex<Option<Rendered>>,
}

impl Notification {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            current: Mutex::new(None),
        }
    }

    /// The notification as currently shown, if any.
    #[must_use]
    pub fn current(&self) -> Option<Rendered> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn render(&self, now_playing: &NowPlaying, is_playing: bool) -> Rendered {
        let body = if is_playing {
            format!("♪ {} - {}", now_playing.song, now_playing.artist)
        } else {
            "Radio Paused - Tap to resume".to_owned()
        };

        Rendered {
            title: self.title.clone(),
            body,
            is_playing,
        }
    }
}

impl Observer for Notification {
    fn now_playing(&self, now_playing: &NowPlaying, is_playing: bool) {
        let rendered = self.render(now_playing, is_playing);
        debug!("notification: {}: {}", rendered.title, rendered.body);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(rendered);
    }

    fn detach(&self) {
        if self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("notification cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_renders_playing_and_paused() {
        let notification = Notification::new("WLHA Radio - The Big 64");
        let mut np = NowPlaying::loading("WLHA Radio");
        np.song = "Hotel California".to_owned();
        np.artist = "Eagles".to_owned();

        notification.now_playing(&np, true);
        let shown = notification.current().unwrap();
        assert_eq!(shown.title, "WLHA Radio - The Big 64");
        assert_eq!(shown.body, "♪ Hotel California - Eagles");

        notification.now_playing(&np, false);
        assert_eq!(
            notification.current().unwrap().body,
            "Radio Paused - Tap to resume"
        );

        notification.detach();
        assert_eq!(notification.current(), None);
    }

    #[test]
    fn media_session_forgets_on_detach() {
        let session = MediaSession::new();
        let np = NowPlaying::loading("WLHA Radio");
        session.now_playing(&np, true);
        assert!(session.last.lock().unwrap().is_some());
        session.detach();
        assert!(session.last.lock().unwrap().is_none());
    }
}

//! Fan-out of "now playing" updates to observers.
//!
//! The publisher forwards every update to every attached [`Observer`],
//! synchronously and in attachment order. It does not compare updates: the
//! same record published twice reaches observers twice.

use std::sync::Arc;

use crate::now_playing::NowPlaying;

/// Receives "now playing" updates, like a media session integration.
pub trait Observer: Send + Sync {
    /// Called with the latest record and whether audio is playing.
    fn now_playing(&self, now_playing: &NowPlaying, is_playing: bool);

    /// Called with a message to show to the user.
    fn alert(&self, message: &str) {
        let _ = message;
    }

    /// Called when the observer is attached to a running session.
    fn attach(&self) {}

    /// Called when the session stops.
    fn detach(&self) {}
}

#[derive(Default)]
pub struct Publisher {
    observers: Vec<Arc<dyn Observer>>,
}

impl Publisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, observer: Arc<dyn Observer>) {
        observer.attach();
        self.observers.push(observer);
    }

    pub fn detach_all(&mut self) {
        for observer in self.observers.drain(..) {
            observer.detach();
        }
    }

    pub fn publish(&self, now_playing: &NowPlaying, is_playing: bool) {
        for observer in &self.observers {
            observer.now_playing(now_playing, is_playing);
        }
    }

    pub fn alert(&self, message: &str) {
        for observer in &self.observers {
            observer.alert(message);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Tagged {
        tag: &'static str,
        journal: Arc<Journal>,
    }

    impl Observer for Tagged {
        fn now_playing(&self, now_playing: &NowPlaying, is_playing: bool) {
            self.journal
                .0
                .lock()
                .unwrap()
                .push(format!("{}: {} {is_playing}", self.tag, now_playing.song));
        }

        fn alert(&self, message: &str) {
            self.journal
                .0
                .lock()
                .unwrap()
                .push(format!("{}: alert {message}", self.tag));
        }

        fn detach(&self) {
            self.journal.0.lock().unwrap().push(format!("{}: detached", self.tag));
        }
    }

    fn publisher(journal: &Arc<Journal>) -> Publisher {
        let mut publisher = Publisher::new();
        for tag in ["car", "lock screen"] {
            publisher.attach(Arc::new(Tagged {
                tag,
                journal: Arc::clone(journal),
            }));
        }
        publisher
    }

    #[test]
    fn publishes_in_attachment_order_without_diffing() {
        let journal = Arc::new(Journal::default());
        let publisher = publisher(&journal);
        let np = NowPlaying::loading("WLHA Radio");

        publisher.publish(&np, true);
        publisher.publish(&np, true);

        assert_eq!(
            journal.entries(),
            [
                "car: Loading... true",
                "lock screen: Loading... true",
                "car: Loading... true",
                "lock screen: Loading... true",
            ]
        );
    }

    #[test]
    fn alerts_and_detach_reach_everyone() {
        let journal = Arc::new(Journal::default());
        let mut publisher = publisher(&journal);

        publisher.alert("offline");
        publisher.detach_all();
        assert!(publisher.is_empty());

        publisher.publish(&NowPlaying::loading("WLHA Radio"), false);
        assert_eq!(
            journal.entries(),
            [
                "car: alert offline",
                "lock screen: alert offline",
                "car: detached",
                "lock screen: detached",
            ]
        );
    }
}

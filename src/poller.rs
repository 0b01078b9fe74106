//! Periodic polling of "now playing" metadata.
//!
//! The poller fetches once immediately and then on every tick of a fixed
//! interval. Ticks are scheduled from the start time, so a slow fetch does
//! not push later polls back. Fetch failures never reach the caller: the
//! fallback record is published instead and polling carries on.
//!
//! # Example
//!
//! ```rust
//! use onair::poller::Poller;
//!
//! let poller = Poller::new(source, config.defaults());
//! let mut handle = poller.start(|now_playing| println!("{now_playing}"), interval);
//!
//! // ...
//!
//! handle.stop();
//! ```

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    metadata::Source,
    now_playing::{Defaults, NowPlaying},
};

/// Fetches metadata and maps it into [`NowPlaying`] records.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn Source>,
    defaults: Defaults,
}

impl Poller {
    /// Shortest interval accepted by [`start`](Self::start).
    const MIN_INTERVAL: Duration = Duration::from_millis(1);

    #[must_use]
    pub fn new(source: Arc<dyn Source>, defaults: Defaults) -> Self {
        Self { source, defaults }
    }

    /// Performs a single fetch.
    ///
    /// Always returns a complete record: fields missing from the payload are
    /// defaulted, and a failed fetch yields the fallback record.
    pub async fn poll(&self) -> NowPlaying {
        match self.source.fetch().await {
            Ok(payload) => self.defaults.apply(payload),
            Err(e) => {
                debug!("metadata fetch failed, using fallback: {e}");
                self.defaults.fallback()
            }
        }
    }

    /// Starts polling every `interval`, calling `on_update` with each result.
    ///
    /// The first poll happens immediately. Polls run one at a time: the next
    /// tick waits until the previous fetch has completed.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn start<F>(&self, mut on_update: F, interval: Duration) -> PollHandle
    where
        F: FnMut(NowPlaying) + Send + 'static,
    {
        let interval = interval.max(Self::MIN_INTERVAL);
        let token = CancellationToken::new();

        let poller = self.clone();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let now_playing = tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    now_playing = poller.poll() => now_playing,
                };

                if cancelled.is_cancelled() {
                    break;
                }
                on_update(now_playing);
            }

            trace!("metadata polling stopped");
        });

        debug!("polling metadata every {:.1}s", interval.as_secs_f32());

        PollHandle {
            token,
            task: Some(task),
        }
    }
}

/// A running poll loop.
///
/// Dropping the handle stops polling.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stops polling. A fetch in flight is abandoned and its result is
    /// discarded.
    ///
    /// Stopping a stopped handle does nothing.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.token.cancel();
            task.abort();
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stops `handle` if there is one.
pub fn stop(handle: Option<&mut PollHandle>) {
    if let Some(handle) = handle {
        handle.stop();
    }
}

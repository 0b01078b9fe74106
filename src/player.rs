//! Playback state machine for a single live stream.
//!
//! The player owns at most one [`Connection`] and moves between these
//! states:
//!
//! ```text
//! Idle ──toggle──▶ Loading ──opened──▶ Playing ◀──toggle──▶ Paused
//!   ▲                 │                    │                   │
//!   └──open failed────┘                    └── terminated ─────┴─▶ Reconnecting
//!                                                                    │
//!                               Loading ◀──── after fixed delay ─────┘
//! ```
//!
//! Any state returns to `Idle` on [`stop`](Player::stop).
//!
//! # Driving the player
//!
//! Commands are `async` methods. Everything that happens on its own (an open
//! completing, a status arriving, the reconnect delay expiring) is awaited
//! with [`wait`](Player::wait), which is cancellation safe and can sit in a
//! `tokio::select!` next to other sources of work, and then handled with
//! [`process`](Player::process):
//!
//! ```rust
//! loop {
//!     tokio::select! {
//!         Some(command) = commands.recv() => { player.toggle().await; }
//!         wakeup = player.wait() => {
//!             if let Some(event) = player.process(wakeup).await {
//!                 println!("{event}");
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! # Reconnection
//!
//! A status that is loaded, not playing and at position zero is taken as
//! the stream having dropped. The player unloads the connection, waits a
//! fixed delay and opens a new one. There is no backoff and no retry limit;
//! a reconnect that fails to open ends in `Idle` with an alert.
//!
//! A pause requested by the user sets an expected-pause flag first, so that
//! the status reporting that pause is not mistaken for a dropped stream.

use std::{fmt, future, pin::Pin, sync::Arc, time::Duration};

use futures_util::future::BoxFuture;
use tokio::{sync::mpsc, time::Sleep};
use url::Url;

use crate::{
    config::Config,
    error::Result,
    events::Event,
    stream::{Connection, Connector, OpenOptions, Status, StatusSender},
    volume::Volume,
};

/// Playback state. Exactly one is live at a time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum State {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Reconnecting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Something that happened to the player on its own, returned by
/// [`Player::wait`].
pub enum Wakeup {
    Opened(Result<Box<dyn Connection>>),
    ReconnectDue,
    Status(u64, Status),
}

impl fmt::Debug for Wakeup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened(Ok(_)) => write!(f, "Opened(Ok)"),
            Self::Opened(Err(e)) => write!(f, "Opened(Err({e}))"),
            Self::ReconnectDue => write!(f, "ReconnectDue"),
            Self::Status(connection, status) => write!(f, "Status({connection}, {status:?})"),
        }
    }
}

pub struct Player {
    connector: Arc<dyn Connector>,
    url: Url,
    station: String,
    reconnect_delay: Duration,

    state: State,
    volume: Volume,
    expected_pause: bool,

    connection: Option<Box<dyn Connection>>,
    /// Identifies the current connection, or the one being opened. Statuses
    /// tagged with any other value are stale.
    connection_id: u64,
    opening: Option<BoxFuture<'static, Result<Box<dyn Connection>>>>,
    reconnect: Option<Pin<Box<Sleep>>>,

    status_tx: mpsc::UnboundedSender<(u64, Status)>,
    status_rx: mpsc::UnboundedReceiver<(u64, Status)>,
}

impl Player {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, config: &Config) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        Self {
            connector,
            url: config.stream_url.clone(),
            station: config.station_name.clone(),
            reconnect_delay: config.reconnect_delay,

            state: State::Idle,
            volume: config.volume,
            expected_pause: false,

            connection: None,
            connection_id: 0,
            opening: None,
            reconnect: None,

            status_tx,
            status_rx,
        }
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == State::Playing
    }

    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Starts, pauses or resumes playback depending on the current state.
    ///
    /// Ignored while a connection is being opened. While waiting to
    /// reconnect, reconnects right away.
    pub async fn toggle(&mut self) -> Option<Event> {
        match self.state {
            State::Idle => Some(self.open()),
            State::Loading => {
                debug!("still connecting, ignoring toggle");
                None
            }
            State::Reconnecting => {
                self.reconnect = None;
                Some(self.open())
            }
            State::Playing => self.pause().await,
            State::Paused => self.resume().await,
        }
    }

    /// Pauses or resumes an existing connection, as remote controls do.
    ///
    /// Unlike [`toggle`](Self::toggle), never opens a connection.
    pub async fn play_pause(&mut self) -> Option<Event> {
        match self.state {
            State::Playing => self.pause().await,
            State::Paused => self.resume().await,
            _ => None,
        }
    }

    /// Pauses playback. Does nothing without a playing connection.
    pub async fn pause(&mut self) -> Option<Event> {
        if self.state != State::Playing {
            return None;
        }
        let connection = self.connection.as_mut()?;

        self.expected_pause = true;
        if let Err(e) = connection.pause().await {
            warn!("failed to pause: {e}");
            self.expected_pause = false;
            return None;
        }

        self.state = State::Paused;
        Some(Event::Paused)
    }

    /// Resumes playback. Does nothing without a paused connection.
    ///
    /// A connection that can no longer resume is treated as dropped.
    pub async fn resume(&mut self) -> Option<Event> {
        if self.state != State::Paused {
            return None;
        }
        let connection = self.connection.as_mut()?;

        match connection.resume().await {
            Ok(()) => {
                self.expected_pause = false;
                self.state = State::Playing;
                Some(Event::Playing)
            }
            Err(e) => {
                warn!("failed to resume: {e}");
                Some(self.begin_reconnect().await)
            }
        }
    }

    /// Releases the connection and cancels any pending open or reconnect.
    ///
    /// Returns `None` when the player was idle already.
    pub async fn stop(&mut self) -> Option<Event> {
        self.opening = None;
        self.reconnect = None;
        self.expected_pause = false;
        self.release().await;

        let was_idle = self.state == State::Idle;
        self.state = State::Idle;
        (!was_idle).then_some(Event::Stopped)
    }

    /// Sets the volume, clamped to `0.0..=1.0`, for the current and all
    /// future connections.
    pub async fn set_volume(&mut self, volume: Volume) -> Volume {
        self.volume = volume;
        if let Some(connection) = self.connection.as_mut() {
            if let Err(e) = connection.set_volume(volume).await {
                warn!("failed to set volume: {e}");
            }
        }
        self.volume
    }

    pub async fn volume_up(&mut self) -> Volume {
        self.set_volume(self.volume.increase()).await
    }

    pub async fn volume_down(&mut self) -> Volume {
        self.set_volume(self.volume.decrease()).await
    }

    /// Waits until an open completes, a status arrives or the reconnect
    /// delay expires.
    ///
    /// Cancellation safe: dropping the future loses nothing.
    pub async fn wait(&mut self) -> Wakeup {
        let wakeup = {
            let opening = &mut self.opening;
            let reconnect = &mut self.reconnect;
            let status_rx = &mut self.status_rx;

            tokio::select! {
                biased;

                result = async {
                    match opening {
                        Some(opening) => opening.await,
                        None => future::pending().await,
                    }
                } => Wakeup::Opened(result),

                () = async {
                    match reconnect {
                        Some(reconnect) => reconnect.await,
                        None => future::pending().await,
                    }
                } => Wakeup::ReconnectDue,

                Some((connection, status)) = status_rx.recv() => {
                    Wakeup::Status(connection, status)
                }
            }
        };

        // Completed futures must not be polled again.
        match wakeup {
            Wakeup::Opened(_) => self.opening = None,
            Wakeup::ReconnectDue => self.reconnect = None,
            Wakeup::Status(..) => {}
        }

        wakeup
    }

    /// Handles what [`wait`](Self::wait) returned.
    pub async fn process(&mut self, wakeup: Wakeup) -> Option<Event> {
        match wakeup {
            Wakeup::Opened(Ok(connection)) => {
                info!("playing {}", self.url);
                self.connection = Some(connection);
                self.state = State::Playing;
                Some(Event::Playing)
            }
            Wakeup::Opened(Err(e)) => {
                error!("failed to connect to {}: {e}", self.url);
                self.state = State::Idle;
                Some(Event::Alert(format!(
                    "Unable to connect to {}. Please check your internet connection.",
                    self.station
                )))
            }
            Wakeup::ReconnectDue => {
                info!("reconnecting to {}", self.url);
                Some(self.open())
            }
            Wakeup::Status(connection, status) => self.on_status(connection, status).await,
        }
    }

    /// Waits for and handles wakeups until one produces an event.
    pub async fn next_event(&mut self) -> Event {
        loop {
            let wakeup = self.wait().await;
            if let Some(event) = self.process(wakeup).await {
                return event;
            }
        }
    }

    fn open(&mut self) -> Event {
        debug_assert!(self.connection.is_none());

        self.connection_id += 1;
        let status = StatusSender::new(self.connection_id, self.status_tx.clone());
        let options = OpenOptions {
            volume: self.volume,
            should_play: true,
            is_looping: false,
        };

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        debug!("connecting to {url}");
        self.opening = Some(Box::pin(async move {
            connector.open(&url, options, status).await
        }));

        self.state = State::Loading;
        Event::Loading
    }

    async fn on_status(&mut self, connection: u64, status: Status) -> Option<Event> {
        if connection != self.connection_id || self.connection.is_none() {
            trace!("ignoring status of stale connection {connection}: {status:?}");
            return None;
        }

        if !status.is_loaded {
            if let Some(error) = status.error {
                warn!("stream error: {error}");
            }
            return None;
        }

        if status.is_unexpected_termination() {
            if self.expected_pause {
                debug!("stream idle while paused");
                return None;
            }
            return Some(self.begin_reconnect().await);
        }

        match (self.state, status.is_playing) {
            (State::Paused, true) => {
                self.expected_pause = false;
                self.state = State::Playing;
                Some(Event::Playing)
            }
            (State::Playing, false) => {
                debug!("paused by platform at {:.1}s", status.position.as_secs_f32());
                self.state = State::Paused;
                Some(Event::Paused)
            }
            _ => None,
        }
    }

    async fn begin_reconnect(&mut self) -> Event {
        self.release().await;
        self.expected_pause = false;
        self.state = State::Reconnecting;
        self.reconnect = Some(Box::pin(tokio::time::sleep(self.reconnect_delay)));

        info!(
            "stream terminated unexpectedly, reconnecting in {:.1}s",
            self.reconnect_delay.as_secs_f32()
        );
        Event::Reconnecting
    }

    async fn release(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.unload().await {
                warn!("failed to unload stream: {e}");
            }
        }
        // Anything the released connection still reports is stale.
        self.connection_id += 1;
    }
}

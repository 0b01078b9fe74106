//! One run of the player, from start to stop.
//!
//! A [`Session`] composes the metadata [`Poller`], the [`Player`] and the
//! [`Publisher`]:
//! * Poll results replace the held [`NowPlaying`] and are published
//! * Player state changes are published with the held [`NowPlaying`]
//! * Alerts are forwarded to observers
//!
//! `start` and `stop` may be called any number of times, in any order, as
//! application lifecycle hooks would. A session holds at most one poll
//! handle and at most one stream connection at any time.

use std::{fmt, str::FromStr, sync::Arc};

use tokio::sync::mpsc;

use crate::{
    config::Config,
    error::{Error, Result},
    events::Event,
    metadata::Source,
    now_playing::NowPlaying,
    player::{self, Player, State},
    poller::{self, PollHandle, Poller},
    publisher::{Observer, Publisher},
    session_id::SessionId,
    stream::{AudioMode, Connector},
    volume::Volume,
};

/// Playback commands accepted by a running session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Toggle,
    PlayPause,
    Pause,
    Resume,
    VolumeUp,
    VolumeDown,
    Stop,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "play" | "toggle" => Ok(Self::Toggle),
            "pp" | "playpause" => Ok(Self::PlayPause),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "+" | "up" => Ok(Self::VolumeUp),
            "-" | "down" => Ok(Self::VolumeDown),
            "s" | "stop" => Ok(Self::Stop),
            other => Err(Error::invalid_argument(format!("unknown command: {other}"))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Toggle => "toggle",
            Self::PlayPause => "play/pause",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::VolumeUp => "volume up",
            Self::VolumeDown => "volume down",
            Self::Stop => "stop",
        };
        write!(f, "{name}")
    }
}

/// Something that happened to the session on its own, returned by
/// [`Session::wait`].
#[derive(Debug)]
pub enum Wakeup {
    Update(SessionId, NowPlaying),
    Player(player::Wakeup),
}

pub struct Session {
    id: Option<SessionId>,

    poller: Poller,
    poll: Option<PollHandle>,
    poll_interval: std::time::Duration,

    player: Player,
    connector: Arc<dyn Connector>,
    audio_mode: AudioMode,
    audio_configured: bool,

    publisher: Publisher,
    observers: Vec<Arc<dyn Observer>>,
    now_playing: NowPlaying,

    updates_tx: mpsc::UnboundedSender<(SessionId, NowPlaying)>,
    updates_rx: mpsc::UnboundedReceiver<(SessionId, NowPlaying)>,
}

impl Session {
    #[must_use]
    pub fn new(config: &Config, source: Arc<dyn Source>, connector: Arc<dyn Connector>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        Self {
            id: None,

            poller: Poller::new(source, config.defaults()),
            poll: None,
            poll_interval: config.poll_interval,

            player: Player::new(Arc::clone(&connector), config),
            connector,
            audio_mode: config.audio_mode,
            audio_configured: false,

            publisher: Publisher::new(),
            observers: Vec::new(),
            now_playing: NowPlaying::loading(&config.station_name),

            updates_tx,
            updates_rx,
        }
    }

    /// Registers an observer. It is attached on every start and detached on
    /// every stop.
    pub fn observe(&mut self, observer: Arc<dyn Observer>) {
        if self.is_running() {
            self.publisher.attach(Arc::clone(&observer));
        }
        self.observers.push(observer);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.id.is_some()
    }

    #[must_use]
    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    #[must_use]
    pub fn now_playing(&self) -> &NowPlaying {
        &self.now_playing
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.player.state()
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        self.player.volume()
    }

    /// Starts the session: configures audio output, attaches observers and
    /// starts polling metadata.
    ///
    /// Does nothing if the session is running already.
    pub async fn start(&mut self) {
        if self.is_running() {
            debug!("session already running");
            return;
        }

        if !self.audio_configured {
            match self.connector.configure(&self.audio_mode).await {
                Ok(()) => self.audio_configured = true,
                Err(e) => warn!("audio setup failed, using defaults: {e}"),
            }
        }

        let id = SessionId::generate();
        self.id = Some(id);

        for observer in &self.observers {
            self.publisher.attach(Arc::clone(observer));
        }

        let updates = self.updates_tx.clone();
        self.poll = Some(self.poller.start(
            move |now_playing| {
                // The receiver lives as long as the session.
                let _ = updates.send((id, now_playing));
            },
            self.poll_interval,
        ));

        info!("session {} started", id.short());
    }

    /// Stops the session: releases the stream connection, stops polling and
    /// detaches observers after telling them playback stopped.
    ///
    /// Does nothing if the session is not running.
    pub async fn stop(&mut self) {
        let Some(id) = self.id.take() else {
            debug!("session not running");
            return;
        };

        self.player.stop().await;
        poller::stop(self.poll.as_mut());
        self.poll = None;

        self.publisher.publish(&self.now_playing, false);
        self.publisher.detach_all();

        // Results that were queued before polling stopped are stale.
        while self.updates_rx.try_recv().is_ok() {}

        info!("session {} stopped", id.short());
    }

    /// Executes a playback command. Ignored when the session is not running.
    pub async fn handle(&mut self, command: Command) {
        if !self.is_running() {
            debug!("session not running, ignoring {command}");
            return;
        }

        let event = match command {
            Command::Toggle => self.player.toggle().await,
            Command::PlayPause => self.player.play_pause().await,
            Command::Pause => self.player.pause().await,
            Command::Resume => self.player.resume().await,
            Command::Stop => self.player.stop().await,
            Command::VolumeUp => {
                let volume = self.player.volume_up().await;
                info!("volume {volume}");
                None
            }
            Command::VolumeDown => {
                let volume = self.player.volume_down().await;
                info!("volume {volume}");
                None
            }
        };

        if let Some(event) = event {
            self.on_event(event);
        }
    }

    /// Waits for the next poll result or player wakeup.
    ///
    /// Cancellation safe.
    pub async fn wait(&mut self) -> Wakeup {
        tokio::select! {
            Some((id, now_playing)) = self.updates_rx.recv() => Wakeup::Update(id, now_playing),
            wakeup = self.player.wait() => Wakeup::Player(wakeup),
        }
    }

    /// Handles what [`wait`](Self::wait) returned.
    pub async fn process(&mut self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::Update(id, now_playing) => {
                if self.id != Some(id) {
                    trace!("discarding metadata of session {id}");
                    return;
                }
                self.now_playing = now_playing;
                self.publisher
                    .publish(&self.now_playing, self.player.is_playing());
            }
            Wakeup::Player(wakeup) => {
                if let Some(event) = self.player.process(wakeup).await {
                    self.on_event(event);
                }
            }
        }
    }

    /// Waits for and handles the next wakeup.
    pub async fn next(&mut self) {
        let wakeup = self.wait().await;
        self.process(wakeup).await;
    }

    fn on_event(&self, event: Event) {
        debug!("player {event}");
        match event {
            Event::Loading => {}
            Event::Alert(message) => self.publisher.alert(&message),
            Event::Playing | Event::Paused | Event::Reconnecting | Event::Stopped => {
                self.publisher
                    .publish(&self.now_playing, event.is_playing());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!("p".parse::<Command>().unwrap(), Command::Toggle);
        assert_eq!(" Pause ".parse::<Command>().unwrap(), Command::Pause);
        assert_eq!("+".parse::<Command>().unwrap(), Command::VolumeUp);
        assert_eq!("-".parse::<Command>().unwrap(), Command::VolumeDown);
        assert!("rewind".parse::<Command>().is_err());
    }
}

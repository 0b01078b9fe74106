//! Live audio stream connections.
//!
//! A [`Connector`] opens a [`Connection`] to a stream URL. The connection
//! then reports its [`Status`] asynchronously through a [`StatusSender`],
//! whenever playback starts, pauses, makes progress or stops.
//!
//! [`HttpConnector`] holds the HTTP connection to the stream and forwards
//! the raw bytes to an optional output, for example standard output piped
//! into an external decoder. It does not decode audio.
//!
//! # Status reporting
//!
//! A stream that drops is reported the way mobile platforms report it:
//! loaded, not playing, at position zero. The [`Player`](crate::player::Player)
//! reconnects on that pattern.

use std::{path::PathBuf, pin::Pin, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    error::{Error, Result},
    http::Client as HttpClient,
    volume::Volume,
};

/// How audio output should behave relative to the rest of the system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AudioMode {
    /// Keep playing when the application is not in the foreground.
    pub stays_active_in_background: bool,

    /// Mix with audio of other applications instead of interrupting it.
    pub mix_with_others: bool,

    /// Lower the volume of other applications instead of pausing them.
    pub duck_others: bool,
}

impl Default for AudioMode {
    fn default() -> Self {
        Self {
            stays_active_in_background: true,
            mix_with_others: false,
            duck_others: true,
        }
    }
}

/// Options for opening a connection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OpenOptions {
    pub volume: Volume,
    pub should_play: bool,
    pub is_looping: bool,
}

/// Snapshot of a connection's playback status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Status {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position: Duration,
    pub error: Option<String>,
}

impl Status {
    #[must_use]
    pub fn playing(position: Duration) -> Self {
        Self {
            is_loaded: true,
            is_playing: true,
            position,
            error: None,
        }
    }

    #[must_use]
    pub fn paused(position: Duration) -> Self {
        Self {
            is_loaded: true,
            is_playing: false,
            position,
            error: None,
        }
    }

    /// Status of a stream that stopped delivering audio.
    #[must_use]
    pub fn terminated() -> Self {
        Self::paused(Duration::ZERO)
    }

    /// Status of a connection that could not load.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Whether this status looks like the stream ended on its own: loaded,
    /// not playing, and at position zero.
    ///
    /// This cannot tell a dropped stream apart from a stall with nothing
    /// buffered yet, nor from a pause issued right at the start.
    #[must_use]
    pub fn is_unexpected_termination(&self) -> bool {
        self.is_loaded && !self.is_playing && self.position.is_zero()
    }
}

/// Delivers statuses of one connection to its owner.
///
/// Statuses are tagged with the connection they belong to, so the owner can
/// discard those of connections it already released.
#[derive(Clone, Debug)]
pub struct StatusSender {
    connection: u64,
    tx: mpsc::UnboundedSender<(u64, Status)>,
}

impl StatusSender {
    #[must_use]
    pub fn new(connection: u64, tx: mpsc::UnboundedSender<(u64, Status)>) -> Self {
        Self { connection, tx }
    }

    /// Sends a status. Returns `false` when nobody listens anymore.
    pub fn send(&self, status: Status) -> bool {
        self.tx.send((self.connection, status)).is_ok()
    }
}

/// Opens connections to live audio streams.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Configures audio output before the first connection is opened.
    ///
    /// # Errors
    ///
    /// Returns error if the output cannot be configured. Playback may still
    /// work with platform defaults.
    async fn configure(&self, mode: &AudioMode) -> Result<()> {
        let _ = mode;
        Ok(())
    }

    /// Opens a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be reached or refuses the
    /// connection.
    async fn open(
        &self,
        url: &Url,
        options: OpenOptions,
        status: StatusSender,
    ) -> Result<Box<dyn Connection>>;
}

/// An open audio stream.
#[async_trait]
pub trait Connection: Send {
    /// # Errors
    ///
    /// Returns error if the stream is no longer connected.
    async fn pause(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the stream is no longer connected.
    async fn resume(&mut self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if the stream is no longer connected.
    async fn set_volume(&mut self, volume: Volume) -> Result<()>;

    /// Closes the stream and releases its resources.
    ///
    /// # Errors
    ///
    /// Returns error if the stream did not shut down cleanly. The stream is
    /// released either way.
    async fn unload(&mut self) -> Result<()>;
}

/// Where an [`HttpConnector`] writes the stream's bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Output {
    /// Discard the bytes.
    #[default]
    Discard,

    /// Write the bytes to standard output.
    Stdout,

    /// Write the bytes to a file, truncating it first.
    File(PathBuf),
}

impl Output {
    async fn open(&self) -> Result<Option<Pin<Box<dyn AsyncWrite + Send>>>> {
        let writer: Pin<Box<dyn AsyncWrite + Send>> = match self {
            Self::Discard => return Ok(None),
            Self::Stdout => Box::pin(tokio::io::stdout()),
            Self::File(path) => Box::pin(tokio::fs::File::create(path).await?),
        };
        Ok(Some(writer))
    }
}

impl std::str::FromStr for Output {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "" => Self::Discard,
            "-" => Self::Stdout,
            path => Self::File(PathBuf::from(path)),
        })
    }
}

/// Connects to streams over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpConnector {
    http_client: HttpClient,
    output: Output,
}

impl HttpConnector {
    #[must_use]
    pub fn new(http_client: HttpClient, output: Output) -> Self {
        Self {
            http_client,
            output,
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn configure(&self, mode: &AudioMode) -> Result<()> {
        debug!(
            "audio mode: background {}, mix {}, duck {}",
            mode.stays_active_in_background, mode.mix_with_others, mode.duck_others
        );
        Ok(())
    }

    async fn open(
        &self,
        url: &Url,
        options: OpenOptions,
        status: StatusSender,
    ) -> Result<Box<dyn Connection>> {
        if options.is_looping {
            return Err(Error::unimplemented("live streams cannot loop"));
        }

        let request = self.http_client.get(url.clone(), HttpClient::ACCEPT_AUDIO);
        let response = self.http_client.execute(request).await?;
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            debug!("stream content type: {content_type:?}");
        }

        let writer = self.output.open().await?;
        Ok(Box::new(HttpConnection::spawn(
            response, writer, options, status,
        )))
    }
}

/// Interval between progress reports while playing.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Time allowed for the output to flush once the stream ends.
const FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Time allowed for the stream task to wind down before it is aborted.
const UNLOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Reads the stream until it ends or the connection is unloaded.
async fn pump(
    response: reqwest::Response,
    mut writer: Option<Pin<Box<dyn AsyncWrite + Send>>>,
    mut playing: watch::Receiver<bool>,
    token: CancellationToken,
    status: StatusSender,
) {
    let bytes = response.bytes_stream();
    tokio::pin!(bytes);

    let mut played = Duration::ZERO;
    let mut resumed_at = playing.borrow().then(Instant::now);
    let mut reported_at = Instant::now();

    let position = |played: Duration, resumed_at: Option<Instant>| {
        played + resumed_at.map_or(Duration::ZERO, |at| at.elapsed())
    };

    if resumed_at.is_some() {
        status.send(Status::playing(Duration::ZERO));
    }

    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break,

            changed = playing.changed() => {
                if changed.is_err() {
                    break;
                }

                let is_playing = *playing.borrow_and_update();
                if is_playing {
                    resumed_at.get_or_insert_with(Instant::now);
                    status.send(Status::playing(played));
                } else {
                    played = position(played, resumed_at.take());
                    status.send(Status::paused(played));
                }
            }

            chunk = bytes.next() => match chunk {
                Some(Ok(chunk)) => {
                    // Live streams keep flowing while paused; drop what
                    // arrives until playback resumes.
                    if resumed_at.is_none() {
                        continue;
                    }

                    if let Some(output) = writer.as_mut() {
                        // A reader that stopped reading must not keep us from
                        // being unloaded.
                        let written = tokio::select! {
                            biased;
                            () = token.cancelled() => break,
                            written = output.write_all(&chunk) => written,
                        };
                        if let Err(e) = written {
                            warn!("stopped writing stream output: {e}");
                            writer = None;
                        }
                    }

                    if reported_at.elapsed() >= PROGRESS_INTERVAL {
                        reported_at = Instant::now();
                        status.send(Status::playing(position(played, resumed_at)));
                    }
                }
                Some(Err(e)) => {
                    warn!("stream interrupted: {e}");
                    status.send(Status::terminated());
                    break;
                }
                None => {
                    info!("stream ended");
                    status.send(Status::terminated());
                    break;
                }
            }
        }
    }

    if let Some(mut output) = writer {
        match tokio::time::timeout(FLUSH_TIMEOUT, output.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("failed to flush stream output: {e}"),
            Err(_) => debug!("gave up flushing stream output"),
        }
    }
}

/// A live HTTP stream.
struct HttpConnection {
    control: watch::Sender<bool>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    volume: Volume,
}

impl HttpConnection {
    /// Starts reading `response` in a background task.
    fn spawn(
        response: reqwest::Response,
        writer: Option<Pin<Box<dyn AsyncWrite + Send>>>,
        options: OpenOptions,
        status: StatusSender,
    ) -> Self {
        let (control, playing) = watch::channel(options.should_play);
        let token = CancellationToken::new();
        let task = tokio::spawn(pump(response, writer, playing, token.clone(), status));

        Self {
            control,
            token,
            task: Some(task),
            volume: options.volume,
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.task {
            Some(ref task) if !task.is_finished() => Ok(()),
            _ => Err(Error::aborted("stream is no longer connected")),
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn pause(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.control.send_replace(false);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.control.send_replace(true);
        Ok(())
    }

    async fn set_volume(&mut self, volume: Volume) -> Result<()> {
        self.ensure_connected()?;
        // Raw stream bytes carry no volume; the external decoder owns it.
        self.volume = volume;
        trace!("stream volume set to {}", self.volume);
        Ok(())
    }

    async fn unload(&mut self) -> Result<()> {
        self.token.cancel();
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(UNLOAD_TIMEOUT, &mut task).await {
            Ok(joined) => {
                joined.map_err(|e| Error::internal(format!("stream task failed: {e}")))
            }
            Err(_) => {
                task.abort();
                Err(Error::deadline_exceeded("stream task did not stop in time"))
            }
        }
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::{
        config::Config,
        error::ErrorKind,
        http::testing::{serve, Body, AUDIO_OK},
    };

    fn client() -> HttpClient {
        HttpClient::new(&Config::new().unwrap()).unwrap()
    }

    fn options(should_play: bool) -> OpenOptions {
        OpenOptions {
            volume: Volume::default(),
            should_play,
            is_looping: false,
        }
    }

    async fn response(url: Url) -> reqwest::Response {
        let client = client();
        client
            .execute(client.get(url, HttpClient::ACCEPT_AUDIO))
            .await
            .unwrap()
    }

    /// Collects statuses until the stream reports it terminated.
    async fn until_terminated(rx: &mut mpsc::UnboundedReceiver<(u64, Status)>) -> Vec<Status> {
        let mut statuses = Vec::new();
        loop {
            let (_, status) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("stream did not terminate")
                .unwrap();
            let terminated = status.is_unexpected_termination();
            statuses.push(status);
            if terminated {
                return statuses;
            }
        }
    }

    #[test]
    fn termination_pattern() {
        assert!(Status::terminated().is_unexpected_termination());
        assert!(!Status::paused(Duration::from_secs(3)).is_unexpected_termination());
        assert!(!Status::playing(Duration::ZERO).is_unexpected_termination());
        assert!(!Status::failed("refused").is_unexpected_termination());
    }

    #[test]
    fn status_sender_tags_connection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = StatusSender::new(7, tx);
        assert!(sender.send(Status::playing(Duration::ZERO)));
        assert_eq!(rx.try_recv().unwrap(), (7, Status::playing(Duration::ZERO)));

        drop(rx);
        assert!(!sender.send(Status::terminated()));
    }

    #[test]
    fn output_from_str() {
        assert_eq!("-".parse::<Output>().unwrap(), Output::Stdout);
        assert_eq!("".parse::<Output>().unwrap(), Output::Discard);
        assert_eq!(
            "live.mp3".parse::<Output>().unwrap(),
            Output::File(PathBuf::from("live.mp3"))
        );
    }

    #[tokio::test]
    async fn end_of_body_reports_termination() {
        let (url, _) = serve(AUDIO_OK.to_owned(), Body::Fixed(b"ID3 frames")).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let connector = HttpConnector::new(client(), Output::Discard);
        let mut connection = connector
            .open(&url, options(true), StatusSender::new(3, tx))
            .await
            .unwrap();

        let statuses = until_terminated(&mut rx).await;
        assert_eq!(statuses.first(), Some(&Status::playing(Duration::ZERO)));
        assert_eq!(statuses.last(), Some(&Status::terminated()));
        connection.unload().await.unwrap();
    }

    #[tokio::test]
    async fn truncated_body_reports_termination() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: 4096\r\n\r\n";
        let (url, _) = serve(head.to_owned(), Body::Fixed(b"short")).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut connection =
            HttpConnection::spawn(response(url).await, None, options(true), StatusSender::new(1, tx));

        let statuses = until_terminated(&mut rx).await;
        assert_eq!(statuses.last(), Some(&Status::terminated()));
        connection.unload().await.unwrap();
    }

    #[tokio::test]
    async fn error_status_fails_to_open() {
        let head = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let (url, _) = serve(head.to_owned(), Body::Fixed(b"")).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let connector = HttpConnector::new(client(), Output::Discard);
        let result = connector
            .open(&url, options(true), StatusSender::new(1, tx))
            .await;
        assert_eq!(result.err().map(|e| e.kind), Some(ErrorKind::FailedPrecondition));
    }

    #[tokio::test]
    async fn bytes_are_forwarded_while_playing() {
        let (url, _) = serve(AUDIO_OK.to_owned(), Body::Fixed(b"OggS")).await;
        let (writer, mut reader) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _connection = HttpConnection::spawn(
            response(url).await,
            Some(Box::pin(writer)),
            options(true),
            StatusSender::new(1, tx),
        );
        until_terminated(&mut rx).await;

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"OggS");
    }

    #[tokio::test]
    async fn bytes_are_dropped_while_paused() {
        let (url, _) = serve(AUDIO_OK.to_owned(), Body::Fixed(b"OggS")).await;
        let (writer, mut reader) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _connection = HttpConnection::spawn(
            response(url).await,
            Some(Box::pin(writer)),
            options(false),
            StatusSender::new(1, tx),
        );
        let statuses = until_terminated(&mut rx).await;
        assert_eq!(statuses, [Status::terminated()]);

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn progress_reports_position() {
        let body = Body::Chunks {
            count: 8,
            every: Duration::from_millis(200),
        };
        let (url, _) = serve(AUDIO_OK.to_owned(), body).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _connection =
            HttpConnection::spawn(response(url).await, None, options(true), StatusSender::new(1, tx));

        let statuses = until_terminated(&mut rx).await;
        assert!(
            statuses
                .iter()
                .any(|status| status.is_playing && status.position >= PROGRESS_INTERVAL),
            "no progress in {statuses:?}"
        );
    }

    #[tokio::test]
    async fn pause_and_resume_report_status() {
        let (url, _) = serve(AUDIO_OK.to_owned(), Body::Endless).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut connection =
            HttpConnection::spawn(response(url).await, None, options(true), StatusSender::new(1, tx));
        assert_eq!(rx.recv().await.unwrap().1, Status::playing(Duration::ZERO));

        connection.pause().await.unwrap();
        let (_, paused) = loop {
            let (id, status) = rx.recv().await.unwrap();
            if !status.is_playing {
                break (id, status);
            }
        };
        assert!(paused.is_loaded);

        connection.resume().await.unwrap();
        connection.unload().await.unwrap();
    }

    #[tokio::test]
    async fn unload_does_not_wait_for_stalled_output() {
        let (url, _) = serve(AUDIO_OK.to_owned(), Body::Endless).await;
        // Never read from, so writes block once the buffer is full.
        let (writer, _reader) = tokio::io::duplex(64);
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut connection = HttpConnection::spawn(
            response(url).await,
            Some(Box::pin(writer)),
            options(true),
            StatusSender::new(1, tx),
        );
        tokio::time::sleep(Duration::from_millis(300)).await;

        let unloaded = tokio::time::timeout(Duration::from_secs(3), connection.unload()).await;
        assert!(matches!(unloaded, Ok(Ok(()))), "unload blocked: {unloaded:?}");
    }
}

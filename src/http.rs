//! HTTP client shared by the metadata poller and the stream connector.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * A consistent `User-Agent`
//! * TCP keep-alive for the long-lived audio connection
//! * Helpers to build `GET` requests with an `Accept` header
//!
//! No read timeout is set: a live audio stream may legitimately stall, and
//! metadata requests rely on transport defaults.
//!
//! # Example
//!
//! ```rust
//! use onair::http::Client;
//!
//! let client = Client::new(&config)?;
//! let request = client.get(url, Client::ACCEPT_JSON);
//! let response = client.execute(request).await?;
//! ```

use std::time::Duration;

use reqwest::{
    header::{HeaderValue, ACCEPT},
    Method, Url,
};

use crate::{config::Config, error::Result};

/// HTTP client with onair defaults.
#[derive(Clone, Debug)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    /// `Accept` header value for metadata requests.
    pub const ACCEPT_JSON: HeaderValue = HeaderValue::from_static("application/json");

    /// `Accept` header value for audio stream requests.
    pub const ACCEPT_AUDIO: HeaderValue = HeaderValue::from_static("audio/*");

    /// Duration to keep idle connections alive.
    ///
    /// Keeps the metadata connection warm between polls.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the `User-Agent` in `config` is not a valid header
    /// value or the TLS backend cannot be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { inner })
    }

    /// Builds a request with specified method, URL and `Accept` header.
    pub fn request<U>(&self, method: Method, url: U, accept: HeaderValue) -> reqwest::Request
    where
        U: Into<Url>,
    {
        let mut request = reqwest::Request::new(method, url.into());
        request.headers_mut().insert(ACCEPT, accept);
        request
    }

    /// Builds a GET request.
    pub fn get<U>(&self, url: U, accept: HeaderValue) -> reqwest::Request
    where
        U: Into<Url>,
    {
        self.request(Method::GET, url, accept)
    }

    /// Executes a request.
    ///
    /// Responses with a non-success status are turned into errors.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the server answers
    /// with a client or server error status.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        let response = self.inner.execute(request).await?;
        response.error_for_status().map_err(Into::into)
    }
}

/// A one-shot HTTP server on the loopback interface.
#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };
    use url::Url;

    pub(crate) const AUDIO_OK: &str =
        "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nConnection: close\r\n\r\n";

    /// What the server sends after the response head.
    pub(crate) enum Body {
        /// These bytes, then the connection is closed.
        Fixed(&'static [u8]),

        /// `count` chunks of 512 bytes, `every` apart, then the connection is
        /// closed.
        Chunks { count: usize, every: Duration },

        /// Bytes until the client goes away.
        Endless,
    }

    /// Accepts one connection, captures its request head and answers with
    /// `head` and `body`.
    pub(crate) async fn serve(head: String, body: Body) -> (Url, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = request_tx.send(String::from_utf8_lossy(&request).into_owned());

            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            match body {
                Body::Fixed(bytes) => {
                    let _ = socket.write_all(bytes).await;
                }
                Body::Chunks { count, every } => {
                    for _ in 0..count {
                        if socket.write_all(&[0; 512]).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(every).await;
                    }
                }
                Body::Endless => {
                    while socket.write_all(&[0; 4096]).await.is_ok() {}
                    return;
                }
            }
            let _ = socket.shutdown().await;
        });

        (Url::parse(&format!("http://{addr}/")).unwrap(), request_rx)
    }
}

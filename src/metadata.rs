//! Sources of "now playing" metadata.
//!
//! A [`Source`] performs one fetch of the station's current metadata. It
//! reports failures as errors and leaves defaulting and fallback to the
//! [`Poller`](crate::poller::Poller).
//!
//! Two sources are provided:
//! * [`HttpSource`] fetches a JSON document from the station's endpoint
//! * [`DemoSource`] picks a random track from a fixed list, for running
//!   without a metadata endpoint

use async_trait::async_trait;
use url::Url;

use crate::{
    error::{Error, Result},
    http::Client as HttpClient,
    now_playing::Payload,
};

/// One-shot fetch of the station's current metadata.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetches the current metadata document.
    ///
    /// # Errors
    ///
    /// Returns error on network failure, non-success status or a payload
    /// that is not a JSON document.
    async fn fetch(&self) -> Result<Payload>;
}

/// Fetches metadata with an HTTP `GET` from the station's endpoint.
#[derive(Clone, Debug)]
pub struct HttpSource {
    http_client: HttpClient,
    url: Option<Url>,
}

impl HttpSource {
    /// Creates a source for `url`.
    ///
    /// Without a URL every fetch fails, so the poller publishes the
    /// fallback record.
    #[must_use]
    pub fn new(http_client: HttpClient, url: Option<Url>) -> Self {
        Self { http_client, url }
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn fetch(&self) -> Result<Payload> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| Error::unimplemented("no metadata endpoint configured"))?;

        let request = self.http_client.get(url, HttpClient::ACCEPT_JSON);
        let response = self.http_client.execute(request).await?;
        let body = response.bytes().await?;

        serde_json::from_slice(&body).map_err(Into::into)
    }
}

/// Picks a random track from a fixed list.
#[derive(Clone, Debug)]
pub struct DemoSource {
    station: String,
}

impl DemoSource {
    const TRACKS: [(&'static str, &'static str, &'static str); 5] = [
        (
            "Sweet Caroline",
            "Neil Diamond",
            "Brother Love's Travelling Salvation Show",
        ),
        ("Don't Stop Believin'", "Journey", "Escape"),
        ("Bohemian Rhapsody", "Queen", "A Night at the Opera"),
        ("Hotel California", "Eagles", "Hotel California"),
        ("Imagine", "John Lennon", "Imagine"),
    ];

    #[must_use]
    pub fn new(station: &str) -> Self {
        Self {
            station: station.to_owned(),
        }
    }
}

#[async_trait]
impl Source for DemoSource {
    async fn fetch(&self) -> Result<Payload> {
        // One extra slot for the station's own programming.
        let index = fastrand::usize(..=Self::TRACKS.len());
        let (title, artist, album) = Self::TRACKS
            .get(index)
            .map_or(("Morning Show", self.station.as_str(), "Live Programming"), |&track| track);

        Ok(Payload {
            title: Some(title.to_owned()),
            artist: Some(artist.to_owned()),
            album: Some(album.to_owned()),
            ..Payload::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::Config,
        error::ErrorKind,
        http::testing::{serve, Body},
        now_playing::Defaults,
        poller::Poller,
    };

    fn http_source(url: Url) -> HttpSource {
        let config = Config::new().unwrap();
        HttpSource::new(HttpClient::new(&config).unwrap(), Some(url))
    }

    fn json(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn http_source_without_url_fails() {
        let config = Config::new().unwrap();
        let source = HttpSource::new(HttpClient::new(&config).unwrap(), None);
        let err = source.fetch().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unimplemented);
    }

    #[tokio::test]
    async fn demo_source_always_has_titles() {
        let source = DemoSource::new("WLHA Radio");
        for _ in 0..20 {
            let payload = source.fetch().await.unwrap();
            assert!(payload.title.is_some());
            assert!(payload.artist.is_some());
            assert!(payload.album.is_some());
        }
    }

    #[tokio::test]
    async fn http_source_requests_json() {
        let (url, request) = serve(
            json(r#"{"title": "Imagine", "artist": "John Lennon", "duration": 183}"#),
            Body::Fixed(b""),
        )
        .await;

        let payload = http_source(url).fetch().await.unwrap();
        assert_eq!(payload.title.as_deref(), Some("Imagine"));
        assert_eq!(payload.artist.as_deref(), Some("John Lennon"));
        assert_eq!(payload.duration, Some(183.0));

        let request = request.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get / "), "{request}");
        assert!(request.contains("accept: application/json"), "{request}");
        assert!(request.contains("user-agent: onair/"), "{request}");
    }

    #[tokio::test]
    async fn http_source_rejects_error_status() {
        let head = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let (url, _) = serve(head.to_owned(), Body::Fixed(b"")).await;

        let err = http_source(url).fetch().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn error_status_polls_to_fallback() {
        let head = "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let (url, _) = serve(head.to_owned(), Body::Fixed(b"")).await;

        let defaults = Defaults {
            station: "WLHA Radio".to_owned(),
            fallback_song: "Live Programming".to_owned(),
            fallback_album: "The Big 64".to_owned(),
        };
        let poller = Poller::new(Arc::new(http_source(url)), defaults.clone());

        let now_playing = poller.poll().await;
        assert_eq!(now_playing.song, defaults.fallback_song);
        assert_eq!(now_playing.artist, defaults.station);
        assert_eq!(now_playing.album, defaults.fallback_album);
    }

    #[tokio::test]
    async fn http_source_rejects_non_json() {
        let (url, _) = serve(json("<html>on air</html>"), Body::Fixed(b"")).await;
        let err = http_source(url).fetch().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}

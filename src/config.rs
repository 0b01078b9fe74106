use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{
    error::{Error, Result},
    now_playing::Defaults,
    stream::AudioMode,
    volume::Volume,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    pub user_agent: String,

    pub station_name: String,
    pub stream_url: Url,
    pub metadata_url: Option<Url>,

    pub fallback_song: String,
    pub fallback_album: String,

    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub volume: Volume,

    pub audio_mode: AudioMode,
}

impl Config {
    pub const DEFAULT_STATION: &'static str = "WLHA Radio";
    pub const DEFAULT_STREAM_URL: &'static str = "https://streaming.live365.com/a04907_2";
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

    /// Creates a configuration for the default station.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the built-in stream URL does not parse.
    pub fn new() -> Result<Self> {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        // `/` and `;` are separators in a `User-Agent` product token.
        let sanitize = |value: &str| value.replace(['/', ';'], "_");
        let user_agent = format!(
            "{app_name}/{app_version} (Rust; {}/{})",
            sanitize(os_name),
            sanitize(&os_version)
        );
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,

            user_agent,

            station_name: Self::DEFAULT_STATION.to_owned(),
            stream_url: Url::parse(Self::DEFAULT_STREAM_URL)?,
            metadata_url: None,

            fallback_song: "Live Programming".to_owned(),
            fallback_album: "The Big 64".to_owned(),

            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            volume: Volume::default(),

            audio_mode: AudioMode::default(),
        })
    }

    /// Overrides settings with those present in a station file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the poll interval is zero.
    pub fn apply(&mut self, file: StationFile) -> Result<()> {
        if let Some(name) = file.name {
            self.station_name = name;
        }
        if let Some(url) = file.stream_url {
            self.stream_url = url;
        }
        if file.metadata_url.is_some() {
            self.metadata_url = file.metadata_url;
        }
        if let Some(song) = file.fallback_song {
            self.fallback_song = song;
        }
        if let Some(album) = file.fallback_album {
            self.fallback_album = album;
        }
        if let Some(secs) = file.poll_interval_secs {
            if secs == 0 {
                return Err(Error::invalid_argument("poll interval cannot be zero"));
            }
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(millis) = file.reconnect_delay_ms {
            self.reconnect_delay = Duration::from_millis(millis);
        }
        if let Some(volume) = file.volume {
            self.volume = Volume::from_ratio(volume);
        }
        if let Some(background) = file.background {
            self.audio_mode.stays_active_in_background = background;
        }
        Ok(())
    }

    #[must_use]
    pub fn defaults(&self) -> Defaults {
        Defaults {
            station: self.station_name.clone(),
            fallback_song: self.fallback_song.clone(),
            fallback_album: self.fallback_album.clone(),
        }
    }
}

/// Station settings as read from a TOML file.
///
/// All keys are optional; absent keys keep their built-in defaults.
///
/// ```toml
/// name = "WLHA Radio"
/// stream_url = "https://streaming.live365.com/a04907_2"
/// metadata_url = "https://example.com/nowplaying"
/// poll_interval_secs = 30
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StationFile {
    pub name: Option<String>,
    pub stream_url: Option<Url>,
    pub metadata_url: Option<Url>,
    pub fallback_song: Option<String>,
    pub fallback_album: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub volume: Option<f32>,
    pub background: Option<bool>,
}

impl StationFile {
    /// Station files are small; refuse anything larger.
    const MAX_SIZE: u64 = 16 * 1024;

    /// Reads and parses a station file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be read, is too large, or is not
    /// valid TOML for a station.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        contents.parse()
    }
}

impl std::str::FromStr for StationFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_match_station() {
        let config = Config::new().unwrap();
        assert_eq!(config.station_name, "WLHA Radio");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect_delay, Duration::from_millis(2000));
        assert_eq!(config.metadata_url, None);
        assert!(config.user_agent.starts_with("onair/"));
    }

    #[test]
    fn station_file_overrides() {
        let file: StationFile = r#"
            name = "KEXP"
            stream_url = "https://kexp.example.com/live.mp3"
            metadata_url = "https://kexp.example.com/nowplaying"
            poll_interval_secs = 15
            volume = 1.7
        "#
        .parse()
        .unwrap();

        let mut config = Config::new().unwrap();
        config.apply(file).unwrap();

        assert_eq!(config.station_name, "KEXP");
        assert_eq!(config.stream_url.as_str(), "https://kexp.example.com/live.mp3");
        assert_eq!(
            config.metadata_url.as_ref().map(Url::as_str),
            Some("https://kexp.example.com/nowplaying")
        );
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.volume, Volume::MAX);
        assert_eq!(config.defaults().station, "KEXP");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file: StationFile = "poll_interval_secs = 0".parse().unwrap();
        let err = Config::new().unwrap().apply(file).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!("colour = \"blue\"".parse::<StationFile>().is_err());
    }
}

use std::{fs::File, io::Read, path::Path};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    clock::DriveMode,
    error::Error,
    playlist::{LabelId, PlaylistDocument},
    sync::{FeedConfig, ReconnectConfig},
    tap::DEFAULT_COLLECT_CLASSNAME,
};

const PLAYLIST_PATH: &str = "api/playlist/";
const TAP_SOURCE_PATH: &str = "api/tap-source/";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the label server, serving the playlist and the tap events.
    pub server_url: String,
    /// Label to show first.  The first playlist item if not set.
    pub current_label_id: Option<LabelId>,
    pub mode: DriveMode,
    pub feed: Option<FeedConfig>,
    pub reconnect: ReconnectConfig,
    pub ignore_tap_reader: bool,
    /// Show `playlist_json` instead of fetching the playlist.
    pub is_preview: bool,
    pub playlist_json: Option<PlaylistDocument>,
    pub collect_classname: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8081/".into(),
            current_label_id: None,
            mode: DriveMode::default(),
            feed: None,
            reconnect: ReconnectConfig::default(),
            ignore_tap_reader: false,
            is_preview: false,
            playlist_json: None,
            collect_classname: DEFAULT_COLLECT_CLASSNAME.into(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, Error> {
        log::info!("loading config: {:?}", path);
        let file = File::open(path)?;
        let config = Self::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_reader(reader: impl Read) -> Result<Config, Error> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.server_url()?;
        if self.mode == DriveMode::FeedDriven && self.feed.is_none() {
            return Err(Error::ConfigError(
                "feed connection is required in feed driven mode".into(),
            ));
        }
        if self.is_preview && self.playlist_json.is_none() {
            return Err(Error::ConfigError(
                "preview mode needs an embedded playlist".into(),
            ));
        }
        Ok(())
    }

    pub fn server_url(&self) -> Result<Url, Error> {
        Ok(Url::parse(&self.server_url)?)
    }

    pub fn playlist_url(&self) -> Result<Url, Error> {
        Ok(self.server_url()?.join(PLAYLIST_PATH)?)
    }

    pub fn tap_source_url(&self) -> Result<Url, Error> {
        Ok(self.server_url()?.join(TAP_SOURCE_PATH)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_partial_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server_url": "http://label.local:8081/",
                "current_label_id": 12,
                "mode": "feed_driven",
                "feed": {{"host": "broker", "port": 15675, "media_player_id": "3"}}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.current_label_id, Some(LabelId(12)));
        assert_eq!(config.feed.as_ref().unwrap().topic(), "mediaplayer.3");
        assert_eq!(config.collect_classname, "collect");
        assert!(!config.ignore_tap_reader);
        assert_eq!(config.reconnect.initial_delay_ms, 250);
        assert_eq!(
            config.playlist_url().unwrap().as_str(),
            "http://label.local:8081/api/playlist/"
        );
        assert_eq!(
            config.tap_source_url().unwrap().as_str(),
            "http://label.local:8081/api/tap-source/"
        );
    }

    #[test]
    fn feed_driven_mode_needs_feed() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let config = Config {
            mode: DriveMode::LocalTick,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn preview_needs_playlist() {
        let config = Config::from_reader(
            &br#"{"mode": "local_tick", "is_preview": true}"#[..],
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_bad_server_url() {
        let config = Config {
            mode: DriveMode::LocalTick,
            server_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }
}

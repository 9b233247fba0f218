use std::{
    io::{BufRead, BufReader},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Sender;
use ureq::Agent;
use url::Url;

use crate::{
    config::Config,
    error::Error,
    kiosk::KioskEvent,
    playlist::{PlaylistDocument, PlaylistStore},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
/// Pause before reopening a dropped tap event stream.
const STREAM_RETRY_DELAY: Duration = Duration::from_secs(3);

/// HTTP side of the label server: the playlist document and the stream of tap
/// reader events.
pub struct WebApi {
    agent: Agent,
    stream_agent: Agent,
    playlist_url: Url,
    tap_source_url: Url,
    preview: Option<PlaylistDocument>,
}

impl WebApi {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let agent = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        // The event stream stays open indefinitely, only bound the connect.
        let stream_agent = Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .build()
            .into();
        let preview = if config.is_preview {
            config.playlist_json.clone()
        } else {
            None
        };
        Ok(Self {
            agent,
            stream_agent,
            playlist_url: config.playlist_url()?,
            tap_source_url: config.tap_source_url()?,
            preview,
        })
    }

    /// Load the playlist, from the embedded document in preview mode or from
    /// the server otherwise.
    pub fn load_playlist(&self) -> Result<PlaylistStore, Error> {
        let document = match &self.preview {
            Some(document) => {
                log::info!("using embedded preview playlist");
                document.clone()
            }
            None => self.fetch_playlist()?,
        };
        PlaylistStore::load(document.into_items())
    }

    fn fetch_playlist(&self) -> Result<PlaylistDocument, Error> {
        log::info!("fetching playlist: {}", self.playlist_url);
        let mut response = self.agent.get(self.playlist_url.as_str()).call()?;
        response
            .body_mut()
            .read_json()
            .map_err(|err| Error::WebApiError(err.to_string()))
    }

    /// Forward tap reader events to the kiosk on a background thread.  The
    /// stream is reopened whenever it drops, until the kiosk stops listening.
    pub fn spawn_tap_stream(&self, sender: Sender<KioskEvent>) -> JoinHandle<()> {
        let agent = self.stream_agent.clone();
        let url = self.tap_source_url.clone();
        thread::spawn(move || loop {
            match stream_taps(&agent, &url, &sender) {
                Ok(false) => {
                    log::info!("kiosk is gone, closing tap stream");
                    break;
                }
                Ok(true) => log::warn!("tap stream ended, reopening"),
                Err(err) => log::warn!("tap stream failed: {}", err),
            }
            thread::sleep(STREAM_RETRY_DELAY);
        })
    }
}

fn stream_taps(agent: &Agent, url: &Url, sender: &Sender<KioskEvent>) -> Result<bool, Error> {
    log::info!("opening tap stream: {}", url);
    let response = agent
        .get(url.as_str())
        .header("Accept", "text/event-stream")
        .call()?;
    let reader = BufReader::new(response.into_body().into_reader());
    read_events(reader, |data| sender.send(KioskEvent::Tap(data)).is_ok())
}

/// Decode a `text/event-stream` body, calling `on_event` with the data of each
/// event.  Returns `Ok(true)` at the end of the stream and `Ok(false)` as soon
/// as `on_event` asks to stop.
pub fn read_events<R, F>(reader: R, mut on_event: F) -> Result<bool, Error>
where
    R: BufRead,
    F: FnMut(Vec<u8>) -> bool,
{
    let mut data: Option<Vec<u8>> = None;
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            if let Some(data) = data.take() {
                if !on_event(data) {
                    return Ok(false);
                }
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        if field == "data" {
            let data = data.get_or_insert_with(Vec::new);
            if !data.is_empty() {
                data.push(b'\n');
            }
            data.extend_from_slice(value.as_bytes());
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(stream: &str) -> (bool, Vec<String>) {
        let mut events = Vec::new();
        let finished = read_events(stream.as_bytes(), |data| {
            events.push(String::from_utf8(data).unwrap());
            true
        })
        .unwrap();
        (finished, events)
    }

    #[test]
    fn decodes_data_events() {
        let stream = ": keep-alive\n\
                      event: tap\n\
                      data: {\"tap_successful\": 1}\n\
                      \n\
                      id: 7\n\
                      data:{\"tap_successful\": 0}\n\
                      \n";
        let (finished, events) = collect(stream);
        assert!(finished);
        assert_eq!(
            events,
            vec![r#"{"tap_successful": 1}"#, r#"{"tap_successful": 0}"#]
        );
    }

    #[test]
    fn joins_multiline_data() {
        let (_, events) = collect("data: {\ndata: \"tap_successful\": 1}\n\n");
        assert_eq!(events, vec!["{\n\"tap_successful\": 1}"]);
    }

    #[test]
    fn drops_unterminated_event() {
        let (finished, events) = collect("data: 1\n\ndata: 2\n");
        assert!(finished);
        assert_eq!(events, vec!["1"]);
    }

    #[test]
    fn stops_when_asked() {
        let mut seen = 0;
        let finished = read_events("data: 1\n\ndata: 2\n\n".as_bytes(), |_| {
            seen += 1;
            false
        })
        .unwrap();
        assert!(!finished);
        assert_eq!(seen, 1);
    }

    #[test]
    fn preview_playlist_skips_network() {
        let document: PlaylistDocument = serde_json::from_str(
            r#"{"playlist_labels": [
                {"label": {"id": 4, "title": "Four"}, "video": {"duration_secs": 12.5}},
                {"label": null, "video": {"duration_secs": 3}}
            ]}"#,
        )
        .unwrap();
        let config = Config {
            server_url: "http://127.0.0.1:9/".into(),
            is_preview: true,
            playlist_json: Some(document),
            ..Config::default()
        };
        let store = WebApi::new(&config).unwrap().load_playlist().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.current().label.title, "Four");
    }
}

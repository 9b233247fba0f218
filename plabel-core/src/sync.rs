use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::{
    clock::ProgressClock,
    error::Error,
    kiosk::KioskEvent,
    playlist::{LabelId, Rotation},
};

const TOPIC_PREFIX: &str = "mediaplayer.";

// Connection failures are reported on the third one in a row, then at most once
// an hour while the problem lasts.
const REPORT_FAILURE_ON: u32 = 3;
const REPORT_FAILURE_EVERY: Duration = Duration::from_secs(3600);

/// Connection settings for the media player feed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub media_player_id: String,
}

impl FeedConfig {
    pub fn topic(&self) -> String {
        format!("{}{}", TOPIC_PREFIX, self.media_player_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: u32,
    /// Give up after this many consecutive failures.  Unlimited if not set.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 30_000,
            multiplier: 2,
            max_attempts: None,
        }
    }
}

/// Capped exponential backoff between reconnection attempts.
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max_attempts) = self.config.max_attempts {
            if self.attempt >= max_attempts {
                return None;
            }
        }
        let factor = u64::from(self.config.multiplier.max(1)).saturating_pow(self.attempt);
        let delay_ms = self
            .config
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        self.attempt += 1;
        Some(Duration::from_millis(delay_ms))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Keeps sporadic failures out of the error log.  A failure is reported the
/// first time on its `first_report_on`-th consecutive occurrence, and then at
/// most once per `report_every`.
pub struct ErrorThrottle {
    first_report_on: u32,
    report_every: Duration,
    consecutive: u32,
    last_reported: Option<Instant>,
}

impl ErrorThrottle {
    pub fn new(first_report_on: u32, report_every: Duration) -> Self {
        Self {
            first_report_on,
            report_every,
            consecutive: 0,
            last_reported: None,
        }
    }

    /// Record one more failure, returns true if it should be reported.
    pub fn record(&mut self, now: Instant) -> bool {
        self.consecutive += 1;
        if self.consecutive < self.first_report_on {
            return false;
        }
        let due = match self.last_reported {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.report_every,
        };
        if due {
            self.last_reported = Some(now);
        }
        due
    }

    /// Forget the failure history.  Returns the number of consecutive failures
    /// that were resolved, if any.
    pub fn clear(&mut self) -> Option<u32> {
        let resolved = self.consecutive;
        self.consecutive = 0;
        self.last_reported = None;
        (resolved > 0).then_some(resolved)
    }
}

/// Position broadcast by the media player.  Other fields of the message
/// (buffer levels, timestamps) are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub label_id: LabelId,
    pub playback_position: f64,
}

impl PositionUpdate {
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        let update: Self = serde_json::from_slice(payload)
            .map_err(|err| Error::MalformedMessage(Box::new(err)))?;
        if update.playback_position.is_finite() {
            Ok(update)
        } else {
            Err(Error::MalformedMessage(
                "playback position is not a finite number".into(),
            ))
        }
    }
}

pub enum FeedEvent {
    Connected,
    ConnectFailed(Error),
    Message(Vec<u8>),
    /// A zero `code` means the connection was closed on purpose.
    ConnectionLost { code: i32, message: String },
}

/// Where a transport reports back.  Cheap to clone.
#[derive(Clone)]
pub struct FeedEvents {
    sender: Sender<KioskEvent>,
}

impl FeedEvents {
    pub fn new(sender: Sender<KioskEvent>) -> Self {
        Self { sender }
    }

    /// Returns false once the kiosk is gone and nobody is listening.
    pub fn send(&self, event: FeedEvent) -> bool {
        self.sender.send(KioskEvent::Feed(event)).is_ok()
    }
}

/// Publish/subscribe client for the media player feed.  All calls return
/// immediately, results of `connect` and every inbound message are delivered
/// through `FeedEvents`.
pub trait FeedTransport: Send {
    fn connect(&mut self, config: &FeedConfig, events: FeedEvents);

    fn subscribe(&mut self, topic: &str) -> Result<(), Error>;

    fn disconnect(&mut self);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncState {
    Stopped,
    Connecting,
    Subscribed,
    WaitingToReconnect,
    GaveUp,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncAction {
    None,
    Connect,
    Subscribe(String),
    ReconnectAfter(Duration),
}

pub struct RealtimeSync {
    config: FeedConfig,
    state: SyncState,
    backoff: Backoff,
    failures: ErrorThrottle,
}

impl RealtimeSync {
    pub fn new(config: FeedConfig, reconnect: ReconnectConfig) -> Self {
        Self {
            config,
            state: SyncState::Stopped,
            backoff: Backoff::new(reconnect),
            failures: ErrorThrottle::new(REPORT_FAILURE_ON, REPORT_FAILURE_EVERY),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn start(&mut self) -> SyncAction {
        log::info!(
            "connecting to media player feed at {}:{}",
            self.config.host,
            self.config.port
        );
        self.state = SyncState::Connecting;
        SyncAction::Connect
    }

    pub fn stop(&mut self) {
        self.state = SyncState::Stopped;
    }

    pub fn on_connected(&mut self) -> SyncAction {
        if self.state != SyncState::Connecting {
            log::warn!("unexpected feed connection in state {:?}", self.state);
            return SyncAction::None;
        }
        SyncAction::Subscribe(self.config.topic())
    }

    pub fn on_subscribed(&mut self) {
        log::info!("subscribed to {}", self.config.topic());
        self.state = SyncState::Subscribed;
        self.backoff.reset();
        if let Some(failures) = self.failures.clear() {
            log::info!(
                "automatically resolved feed connection problem after {} failures",
                failures
            );
        }
    }

    pub fn on_connect_failed(&mut self, err: &Error, now: Instant) -> SyncAction {
        if self.state == SyncState::Stopped {
            return SyncAction::None;
        }
        self.retry(err, now)
    }

    /// Handle the end of a connection.  Only a live connection counts, a late
    /// report for one already given up on leaves any pending reconnect alone.
    pub fn on_connection_lost(&mut self, code: i32, message: &str, now: Instant) -> SyncAction {
        if !matches!(self.state, SyncState::Connecting | SyncState::Subscribed) {
            log::debug!(
                "ignoring feed close ({}) in state {:?}",
                code,
                self.state
            );
            return SyncAction::None;
        }
        if code == 0 {
            log::info!("feed connection closed");
            self.state = SyncState::Stopped;
            return SyncAction::None;
        }
        let err = Error::FeedDisconnected {
            code,
            message: message.to_owned(),
        };
        self.retry(&err, now)
    }

    pub fn on_reconnect_timer(&mut self) -> SyncAction {
        match self.state {
            SyncState::WaitingToReconnect => {
                self.state = SyncState::Connecting;
                SyncAction::Connect
            }
            _ => SyncAction::None,
        }
    }

    /// Forward an authoritative position to the clock.  Fails with `NotReady`
    /// if there is no playlist to rotate through yet.
    pub fn on_message(
        &mut self,
        payload: &[u8],
        clock: Option<&mut ProgressClock>,
    ) -> Result<Rotation, Error> {
        let clock = clock.ok_or(Error::NotReady)?;
        let update = PositionUpdate::parse(payload)?;
        Ok(clock.set_authoritative(update.label_id, update.playback_position))
    }

    fn retry(&mut self, err: &Error, now: Instant) -> SyncAction {
        if self.failures.record(now) {
            log::error!("media player feed error: {}", err);
        } else {
            log::warn!("media player feed error: {}", err);
        }
        match self.backoff.next_delay() {
            Some(delay) => {
                log::info!(
                    "reconnecting in {:?} (attempt {})",
                    delay,
                    self.backoff.attempt()
                );
                self.state = SyncState::WaitingToReconnect;
                SyncAction::ReconnectAfter(delay)
            }
            None => {
                log::error!(
                    "giving up on media player feed after {} attempts",
                    self.backoff.attempt()
                );
                self.state = SyncState::GaveUp;
                SyncAction::None
            }
        }
    }
}

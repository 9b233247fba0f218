use std::time::Instant;

use crossbeam_channel::Sender;

use crate::{
    actor::{Act, Actor},
    clock::{DriveMode, ProgressClock, TICK_INTERVAL},
    config::Config,
    countdown::CountdownDisplay,
    display::{DisplaySurface, TapView, ViewModel},
    error::Error,
    playlist::{LabelId, PlaylistStore, Rotation},
    sync::{FeedEvent, FeedEvents, FeedTransport, RealtimeSync, SyncAction, SyncState},
    tap::{TapOutcome, TapReactionController, TapTimer},
    timer::{Fired, Timers},
};

/// Keyboard shortcuts of the kiosk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Key {
    /// `0`..=`9`, jumps to that tenth of the current item.
    Digit(u8),
    /// Right arrow, advances to the next label.
    Next,
    /// `t`, simulates a successful tap.
    Tap,
}

impl Key {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' => c.to_digit(10).map(|digit| Self::Digit(digit as u8)),
            't' | 'T' => Some(Self::Tap),
            _ => None,
        }
    }
}

pub enum KioskEvent {
    /// Navigation trigger, e.g. a changed URL fragment.
    Navigate(LabelId),
    Key(Key),
    /// Raw payload from the tap event stream.
    Tap(Vec<u8>),
    /// A click anywhere on the screen.
    Click,
    Feed(FeedEvent),
    /// Nothing to do but fire due timers.
    Wake,
    Shutdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KioskTimer {
    Tap(TapTimer),
    Tick,
    Reconnect,
}

impl From<TapTimer> for KioskTimer {
    fn from(timer: TapTimer) -> Self {
        Self::Tap(timer)
    }
}

/// Composition point of the kiosk: owns the playback clock, the feed
/// subscription, the tap controller and the timers driving them, and renders
/// into the display surface after every change.
pub struct Kiosk<S> {
    config: Config,
    clock: Option<ProgressClock>,
    sync: Option<RealtimeSync>,
    transport: Option<Box<dyn FeedTransport>>,
    tap: TapReactionController,
    timers: Timers<KioskTimer>,
    countdown: CountdownDisplay,
    shown_label: Option<LabelId>,
    surface: S,
    events: Sender<KioskEvent>,
    disposed: bool,
}

impl<S: DisplaySurface> Kiosk<S> {
    pub fn new(config: Config, surface: S, events: Sender<KioskEvent>) -> Self {
        let tap = TapReactionController::new(config.collect_classname.clone());
        Self {
            config,
            clock: None,
            sync: None,
            transport: None,
            tap,
            timers: Timers::new(),
            countdown: CountdownDisplay::new(),
            shown_label: None,
            surface,
            events,
            disposed: false,
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn FeedTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(&self) -> Option<&ProgressClock> {
        self.clock.as_ref()
    }

    pub fn tap(&self) -> &TapReactionController {
        &self.tap
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn sync_state(&self) -> Option<SyncState> {
        self.sync.as_ref().map(RealtimeSync::state)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Start showing `store`, anchored at the configured label or the first
    /// item, and start moving the playback position according to the mode.
    pub fn init(&mut self, store: PlaylistStore, now: Instant) {
        let anchor = self
            .config
            .current_label_id
            .unwrap_or_else(|| store.current_label_id());
        let mut clock = ProgressClock::new(store, self.config.mode);
        if let Rotation::LabelNotFound(label_id) = clock.navigate(anchor) {
            log::warn!("initial label {} is not in the playlist", label_id);
        }
        log::info!(
            "showing {} labels, starting at {}",
            clock.store().len(),
            clock.store().current_label_id()
        );
        self.clock = Some(clock);

        match self.config.mode {
            DriveMode::LocalTick => {
                self.timers
                    .schedule_after(now, TICK_INTERVAL, KioskTimer::Tick);
            }
            DriveMode::FeedDriven => self.start_sync(now),
        }
        self.render();
    }

    fn start_sync(&mut self, now: Instant) {
        let Some(feed) = self.config.feed.clone() else {
            log::error!("no feed connection configured, position will not update");
            return;
        };
        if self.transport.is_none() {
            log::error!("no feed transport available, position will not update");
            return;
        }
        let mut sync = RealtimeSync::new(feed, self.config.reconnect.clone());
        let action = sync.start();
        self.sync = Some(sync);
        self.execute(action, now);
    }

    pub fn dispatch(&mut self, event: KioskEvent, now: Instant) {
        if self.disposed {
            log::debug!("kiosk disposed, dropping event");
            return;
        }
        match event {
            KioskEvent::Navigate(label_id) => self.navigate(label_id),
            KioskEvent::Key(key) => self.handle_key(key, now),
            KioskEvent::Tap(payload) => {
                if self.config.ignore_tap_reader {
                    log::debug!("tap reader ignored, dropping tap event");
                    return;
                }
                match TapOutcome::parse(&payload) {
                    Ok(outcome) => self.handle_tap(outcome, now),
                    Err(err) => log::warn!("dropping tap event: {}", err),
                }
            }
            KioskEvent::Click => {
                if self.tap.dismiss_dialogue(&mut self.timers) {
                    self.render();
                }
            }
            KioskEvent::Feed(event) => self.handle_feed(event, now),
            KioskEvent::Wake => {}
            KioskEvent::Shutdown => self.dispose(),
        }
    }

    fn navigate(&mut self, label_id: LabelId) {
        let Some(clock) = self.clock.as_mut() else {
            log::warn!("navigation to {} before the playlist is loaded", label_id);
            return;
        };
        if let Rotation::LabelNotFound(label_id) = clock.navigate(label_id) {
            log::warn!("label {} is not in the playlist, showing first label", label_id);
        }
        self.render();
    }

    fn handle_key(&mut self, key: Key, now: Instant) {
        match key {
            Key::Digit(digit) => {
                if let Some(clock) = self.clock.as_mut() {
                    clock.set_position(0.1 * f64::from(digit));
                    self.render();
                }
            }
            Key::Next => {
                let next = self
                    .clock
                    .as_ref()
                    .and_then(|clock| clock.store().next_label_id());
                if let Some(next) = next {
                    self.navigate(next);
                }
            }
            Key::Tap => self.handle_tap(TapOutcome::Success, now),
        }
    }

    fn handle_tap(&mut self, outcome: TapOutcome, now: Instant) {
        let reaction = self.tap.handle(outcome, now, &mut self.timers);
        log::info!("tap {:?}: {:?}", outcome, reaction);
        self.render();
    }

    fn handle_feed(&mut self, event: FeedEvent, now: Instant) {
        let Some(sync) = self.sync.as_mut() else {
            log::debug!("feed event without subscription, dropping");
            return;
        };
        match event {
            FeedEvent::Connected => {
                let action = sync.on_connected();
                self.execute(action, now);
            }
            FeedEvent::ConnectFailed(err) => {
                let action = sync.on_connect_failed(&err, now);
                self.execute(action, now);
            }
            FeedEvent::Message(payload) => match sync.on_message(&payload, self.clock.as_mut()) {
                Ok(Rotation::Found) => self.render(),
                Ok(Rotation::LabelNotFound(label_id)) => {
                    log::warn!("media player is playing unknown label {}", label_id);
                }
                Err(err) => log::warn!("dropping feed message: {}", err),
            },
            FeedEvent::ConnectionLost { code, message } => {
                let action = sync.on_connection_lost(code, &message, now);
                self.execute(action, now);
            }
        }
    }

    fn execute(&mut self, action: SyncAction, now: Instant) {
        let (Some(sync), Some(transport)) = (self.sync.as_mut(), self.transport.as_mut()) else {
            return;
        };
        match action {
            SyncAction::None => {}
            SyncAction::Connect => {
                transport.connect(sync.config(), FeedEvents::new(self.events.clone()));
            }
            SyncAction::Subscribe(topic) => match transport.subscribe(&topic) {
                Ok(()) => sync.on_subscribed(),
                Err(err) => {
                    transport.disconnect();
                    let action = sync.on_connect_failed(&err, now);
                    self.execute(action, now);
                }
            },
            SyncAction::ReconnectAfter(delay) => {
                self.timers
                    .schedule_after(now, delay, KioskTimer::Reconnect);
            }
        }
    }

    /// Fire every timer due at `now`, in deadline order.
    pub fn fire_due(&mut self, now: Instant) {
        let mut changed = false;
        while let Some(fired) = self.timers.pop_due(now) {
            changed |= self.on_timer(fired, now);
        }
        if changed {
            self.render();
        }
    }

    fn on_timer(&mut self, fired: Fired<KioskTimer>, now: Instant) -> bool {
        let Fired { id, due, key } = fired;
        match key {
            KioskTimer::Tap(timer) => {
                self.tap.on_timer(id, timer);
                true
            }
            KioskTimer::Tick => {
                self.timers
                    .schedule_after(due, TICK_INTERVAL, KioskTimer::Tick);
                self.clock
                    .as_mut()
                    .map_or(false, |clock| clock.tick(TICK_INTERVAL))
            }
            KioskTimer::Reconnect => {
                if let Some(sync) = self.sync.as_mut() {
                    let action = sync.on_reconnect_timer();
                    self.execute(action, now);
                }
                false
            }
        }
    }

    fn render(&mut self) {
        let Some(clock) = self.clock.as_ref() else {
            return;
        };
        let current_label = clock.store().current_label_id();
        let countdown = if self.shown_label != Some(current_label) {
            self.shown_label = Some(current_label);
            self.countdown.restart(clock.remaining_secs())
        } else {
            self.countdown.update(clock.remaining_secs())
        };
        let upcoming = clock.project_upcoming();
        let view = ViewModel {
            current: clock.current(),
            progress: clock.position(),
            countdown,
            upcoming,
            tap: TapView {
                phase: self.tap.phase(),
                text: self.tap.text(),
                class_name: self.tap.class_name(),
            },
            error_text: self.tap.error_text(),
        };
        self.surface.render(&view);
    }

    /// Cancel all timers and close the feed.  The kiosk ignores every event
    /// afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.tap.dispose(&mut self.timers);
        self.timers.clear();
        if let Some(sync) = self.sync.as_mut() {
            sync.stop();
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect();
        }
        self.disposed = true;
        log::info!("kiosk disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<S: DisplaySurface> Actor for Kiosk<S> {
    type Message = KioskEvent;
    type Error = Error;

    fn handle(&mut self, msg: KioskEvent) -> Result<Act<Self>, Self::Error> {
        let now = Instant::now();
        self.dispatch(msg, now);
        if self.disposed {
            return Ok(Act::Shutdown);
        }
        self.fire_due(now);
        Ok(match self.timers.next_deadline() {
            Some(deadline) => Act::WaitUntil {
                deadline,
                timeout_msg: KioskEvent::Wake,
            },
            None => Act::Continue,
        })
    }
}

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::Error,
    timer::{TimerId, Timers},
};

pub const ERROR_DIALOGUE_DWELL: Duration = Duration::from_millis(3000);

pub const TAP_FAILURE_TEXT: &str = "Work not collected\n\nSee a Visitor Experience staff member";

pub const DEFAULT_COLLECT_CLASSNAME: &str = "collect";

const IDLE_TEXT: &str = "COLLECT";
const COLLECTED_TEXT: &str = "COLLECTED";

/// Transitions of the collect animation, all relative to the tap that started
/// it.
const COLLECT_SEQUENCE: [(Duration, TapStep); 3] = [
    (Duration::from_millis(500), TapStep::Collected),
    (Duration::from_millis(3000), TapStep::Settling),
    (Duration::from_millis(3500), TapStep::Finish),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TapOutcome {
    Success,
    Failure,
}

impl TapOutcome {
    /// Parse a tap event payload, `{"tap_successful": 0 | 1}`.  Anything but
    /// exactly `1`, a missing field included, is a failed tap.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        #[derive(Deserialize)]
        struct TapMessage {
            #[serde(default)]
            tap_successful: Value,
        }

        let message: TapMessage = serde_json::from_slice(payload)
            .map_err(|err| Error::MalformedMessage(Box::new(err)))?;
        if message.tap_successful == 1 {
            Ok(Self::Success)
        } else {
            Ok(Self::Failure)
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TapPhase {
    Idle,
    Collecting,
    Collected,
    Settling,
}

impl TapPhase {
    pub fn text(self) -> &'static str {
        match self {
            Self::Idle | Self::Collecting => IDLE_TEXT,
            Self::Collected | Self::Settling => COLLECTED_TEXT,
        }
    }

    fn modifiers(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Collecting => " hidden",
            Self::Collected => " active",
            Self::Settling => " active hidden",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TapStep {
    Collected,
    Settling,
    Finish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TapTimer {
    Step(TapStep),
    CloseDialogue,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TapReaction {
    Started,
    /// A sequence is already in flight, the tap is debounced.
    Ignored,
    ErrorShown,
}

struct ErrorDialogue {
    text: &'static str,
    close_timer: TimerId,
}

pub struct TapReactionController {
    phase: TapPhase,
    is_animating_collect: bool,
    pending: Vec<TimerId>,
    dialogue: Option<ErrorDialogue>,
    collect_classname: String,
}

impl TapReactionController {
    pub fn new(collect_classname: impl Into<String>) -> Self {
        Self {
            phase: TapPhase::Idle,
            is_animating_collect: false,
            pending: Vec::new(),
            dialogue: None,
            collect_classname: collect_classname.into(),
        }
    }

    pub fn phase(&self) -> TapPhase {
        self.phase
    }

    pub fn is_animating_collect(&self) -> bool {
        self.is_animating_collect
    }

    pub fn text(&self) -> &'static str {
        self.phase.text()
    }

    pub fn class_name(&self) -> String {
        format!("{}{}", self.collect_classname, self.phase.modifiers())
    }

    pub fn error_text(&self) -> Option<&'static str> {
        self.dialogue.as_ref().map(|dialogue| dialogue.text)
    }

    pub fn handle<K>(
        &mut self,
        outcome: TapOutcome,
        now: Instant,
        timers: &mut Timers<K>,
    ) -> TapReaction
    where
        K: From<TapTimer>,
    {
        match outcome {
            TapOutcome::Failure => {
                self.open_dialogue(TAP_FAILURE_TEXT, now, timers);
                TapReaction::ErrorShown
            }
            TapOutcome::Success if self.is_animating_collect => TapReaction::Ignored,
            TapOutcome::Success => {
                for id in self.pending.drain(..) {
                    timers.cancel(id);
                }
                self.is_animating_collect = true;
                self.phase = TapPhase::Collecting;
                for (offset, step) in COLLECT_SEQUENCE {
                    let id = timers.schedule_after(now, offset, TapTimer::Step(step).into());
                    self.pending.push(id);
                }
                TapReaction::Started
            }
        }
    }

    pub fn on_timer(&mut self, id: TimerId, timer: TapTimer) {
        match timer {
            TapTimer::Step(step) => {
                if !self.pending.contains(&id) {
                    log::warn!("stale collect step {:?}, ignoring", step);
                    return;
                }
                self.pending.retain(|pending| *pending != id);
                self.apply(step);
            }
            TapTimer::CloseDialogue => {
                if matches!(&self.dialogue, Some(dialogue) if dialogue.close_timer == id) {
                    self.dialogue = None;
                }
            }
        }
    }

    fn apply(&mut self, step: TapStep) {
        match step {
            TapStep::Collected => self.phase = TapPhase::Collected,
            TapStep::Settling => self.phase = TapPhase::Settling,
            TapStep::Finish => {
                self.phase = TapPhase::Idle;
                self.is_animating_collect = false;
            }
        }
    }

    fn open_dialogue<K>(&mut self, text: &'static str, now: Instant, timers: &mut Timers<K>)
    where
        K: From<TapTimer>,
    {
        if let Some(previous) = self.dialogue.take() {
            timers.cancel(previous.close_timer);
        }
        let close_timer =
            timers.schedule_after(now, ERROR_DIALOGUE_DWELL, TapTimer::CloseDialogue.into());
        self.dialogue = Some(ErrorDialogue { text, close_timer });
    }

    /// Close the error dialogue on a click anywhere.  Returns false if there
    /// was nothing to close.
    pub fn dismiss_dialogue<K>(&mut self, timers: &mut Timers<K>) -> bool {
        match self.dialogue.take() {
            Some(dialogue) => {
                timers.cancel(dialogue.close_timer);
                true
            }
            None => false,
        }
    }

    /// Cancel everything still scheduled and return to idle.
    pub fn dispose<K>(&mut self, timers: &mut Timers<K>) {
        for id in self.pending.drain(..) {
            timers.cancel(id);
        }
        self.dismiss_dialogue(timers);
        self.phase = TapPhase::Idle;
        self.is_animating_collect = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn run_until(tap: &mut TapReactionController, timers: &mut Timers<TapTimer>, now: Instant) {
        while let Some(fired) = timers.pop_due(now) {
            tap.on_timer(fired.id, fired.key);
        }
    }

    #[test]
    fn parses_tap_payloads() {
        assert_eq!(
            TapOutcome::parse(br#"{"tap_successful": 1}"#).unwrap(),
            TapOutcome::Success
        );
        assert_eq!(
            TapOutcome::parse(br#"{"tap_successful": 0}"#).unwrap(),
            TapOutcome::Failure
        );
        assert_eq!(TapOutcome::parse(b"{}").unwrap(), TapOutcome::Failure);
    }

    #[test]
    fn non_numeric_tap_flag_is_a_failed_tap() {
        for payload in [
            &br#"{"tap_successful": true}"#[..],
            br#"{"tap_successful": "1"}"#,
            br#"{"tap_successful": null}"#,
            br#"{"tap_successful": 2}"#,
        ] {
            assert_eq!(TapOutcome::parse(payload).unwrap(), TapOutcome::Failure);
        }
        assert!(matches!(
            TapOutcome::parse(b"not json"),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn collect_sequence_timings() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        let mut tap = TapReactionController::new(DEFAULT_COLLECT_CLASSNAME);

        assert_eq!(
            tap.handle(TapOutcome::Success, t0, &mut timers),
            TapReaction::Started
        );
        assert_eq!(tap.phase(), TapPhase::Collecting);
        assert_eq!(tap.class_name(), "collect hidden");
        assert_eq!(tap.text(), "COLLECT");

        run_until(&mut tap, &mut timers, t0 + ms(499));
        assert_eq!(tap.phase(), TapPhase::Collecting);

        run_until(&mut tap, &mut timers, t0 + ms(500));
        assert_eq!(tap.phase(), TapPhase::Collected);
        assert_eq!(tap.class_name(), "collect active");
        assert_eq!(tap.text(), "COLLECTED");

        run_until(&mut tap, &mut timers, t0 + ms(3000));
        assert_eq!(tap.phase(), TapPhase::Settling);
        assert_eq!(tap.class_name(), "collect active hidden");
        assert!(tap.is_animating_collect());

        run_until(&mut tap, &mut timers, t0 + ms(3499));
        assert!(tap.is_animating_collect());

        run_until(&mut tap, &mut timers, t0 + ms(3500));
        assert_eq!(tap.phase(), TapPhase::Idle);
        assert_eq!(tap.class_name(), "collect");
        assert!(!tap.is_animating_collect());
        assert!(timers.is_empty());
    }

    #[test]
    fn second_success_is_debounced() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        let mut tap = TapReactionController::new("collect");

        tap.handle(TapOutcome::Success, t0, &mut timers);
        run_until(&mut tap, &mut timers, t0 + ms(1000));
        assert_eq!(
            tap.handle(TapOutcome::Success, t0 + ms(1000), &mut timers),
            TapReaction::Ignored
        );
        assert_eq!(timers.len(), 2);
        assert_eq!(tap.phase(), TapPhase::Collected);

        run_until(&mut tap, &mut timers, t0 + ms(3500));
        assert!(!tap.is_animating_collect());
        assert!(timers.is_empty());
    }

    #[test]
    fn failure_shows_dialogue_without_guard() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        let mut tap = TapReactionController::new("collect");

        assert_eq!(
            tap.handle(TapOutcome::Failure, t0, &mut timers),
            TapReaction::ErrorShown
        );
        assert!(!tap.is_animating_collect());
        assert_eq!(tap.phase(), TapPhase::Idle);
        assert_eq!(tap.error_text(), Some(TAP_FAILURE_TEXT));

        assert_eq!(
            tap.handle(TapOutcome::Success, t0 + ms(10), &mut timers),
            TapReaction::Started
        );
        assert!(tap.is_animating_collect());

        run_until(&mut tap, &mut timers, t0 + ms(3000));
        assert_eq!(tap.error_text(), None);
    }

    #[test]
    fn new_error_replaces_dismiss_timer() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        let mut tap = TapReactionController::new("collect");

        tap.handle(TapOutcome::Failure, t0, &mut timers);
        tap.handle(TapOutcome::Failure, t0 + ms(2000), &mut timers);
        assert_eq!(timers.len(), 1);

        run_until(&mut tap, &mut timers, t0 + ms(3000));
        assert!(tap.error_text().is_some());
        run_until(&mut tap, &mut timers, t0 + ms(5000));
        assert!(tap.error_text().is_none());
    }

    #[test]
    fn click_dismisses_dialogue() {
        let t0 = Instant::now();
        let mut timers: Timers<TapTimer> = Timers::new();
        let mut tap = TapReactionController::new("collect");

        tap.handle(TapOutcome::Failure, t0, &mut timers);
        assert!(tap.dismiss_dialogue(&mut timers));
        assert!(tap.error_text().is_none());
        assert!(timers.is_empty());
        assert!(!tap.dismiss_dialogue(&mut timers));
    }

    #[test]
    fn dispose_clears_pending_timers() {
        let t0 = Instant::now();
        let mut timers: Timers<TapTimer> = Timers::new();
        let mut tap = TapReactionController::new("collect");

        tap.handle(TapOutcome::Success, t0, &mut timers);
        tap.handle(TapOutcome::Failure, t0, &mut timers);
        assert_eq!(timers.len(), 4);

        tap.dispose(&mut timers);
        assert!(timers.is_empty());
        assert_eq!(tap.phase(), TapPhase::Idle);
        assert!(!tap.is_animating_collect());
        assert!(tap.error_text().is_none());
    }
}

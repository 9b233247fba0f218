use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::playlist::{LabelId, PlaylistItem, PlaylistStore, Rotation};

pub const TICKS_PER_SECOND: u64 = 5;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / TICKS_PER_SECOND);

/// How the playback position moves forward.  Fixed for the lifetime of the
/// kiosk.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Only authoritative updates from the media player feed move the position.
    FeedDriven,
    /// No feed, position is extrapolated on a fixed-rate tick.
    LocalTick,
}

impl Default for DriveMode {
    fn default() -> Self {
        Self::FeedDriven
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    pub current_label_id: LabelId,
    pub next_label_id: Option<LabelId>,
    pub playback_position: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct Upcoming<'a> {
    pub item: &'a PlaylistItem,
    /// Running total: the remaining time of the current item plus the
    /// durations of every item up to and including this one.
    pub cumulative_wait_secs: f64,
}

pub struct ProgressClock {
    store: PlaylistStore,
    position: f64,
    mode: DriveMode,
}

impl ProgressClock {
    pub fn new(store: PlaylistStore, mode: DriveMode) -> Self {
        Self {
            store,
            position: 0.0,
            mode,
        }
    }

    pub fn store(&self) -> &PlaylistStore {
        &self.store
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn current(&self) -> &PlaylistItem {
        self.store.current()
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_label_id: self.store.current_label_id(),
            next_label_id: self.store.next_label_id(),
            playback_position: self.position,
        }
    }

    /// Jump to a label on a navigation trigger.  Playback of the new label is
    /// assumed to start from the beginning.
    pub fn navigate(&mut self, label_id: LabelId) -> Rotation {
        let rotation = self.store.rotate_to(label_id);
        self.position = 0.0;
        rotation
    }

    /// Apply a position reported by the media player.  Unknown labels leave the
    /// current state untouched, the reported position would not belong to
    /// anything we can show.
    pub fn set_authoritative(&mut self, label_id: LabelId, position: f64) -> Rotation {
        if label_id != self.store.current_label_id() {
            if !self.store.contains(label_id) {
                return Rotation::LabelNotFound(label_id);
            }
            let rotation = self.store.rotate_to(label_id);
            debug_assert!(rotation.is_found());
        }
        self.position = clamp_position(position);
        Rotation::Found
    }

    /// Manual override, used by the digit keyboard shortcuts.
    pub fn set_position(&mut self, position: f64) {
        self.position = clamp_position(position);
    }

    /// Advance the local estimate by `delta`.  Returns false once the position
    /// has reached the end and the tick no longer contributes.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if self.position >= 1.0 {
            return false;
        }
        let duration = self.current().duration_secs();
        if duration > 0.0 {
            self.position = (self.position + delta.as_secs_f64() / duration).min(1.0);
        } else {
            self.position = 1.0;
        }
        true
    }

    pub fn remaining_secs(&self) -> f64 {
        self.current().duration_secs() * (1.0 - self.position)
    }

    pub fn project_upcoming(&self) -> Vec<Upcoming<'_>> {
        let mut upcoming = Vec::with_capacity(self.store.len());
        let mut wait = 0.0;
        for (index, item) in self.store.view().iter().enumerate() {
            wait = if index == 0 {
                self.remaining_secs()
            } else {
                wait + item.duration_secs()
            };
            upcoming.push(Upcoming {
                item,
                cumulative_wait_secs: wait,
            });
        }
        upcoming
    }
}

fn clamp_position(position: f64) -> f64 {
    if position.is_nan() {
        0.0
    } else {
        position.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::tests::item;

    fn clock(mode: DriveMode) -> ProgressClock {
        let store = PlaylistStore::load(vec![item(1, 60.0), item(2, 90.0), item(3, 30.0)])
            .unwrap();
        ProgressClock::new(store, mode)
    }

    fn waits(clock: &ProgressClock) -> Vec<(u64, f64)> {
        clock
            .project_upcoming()
            .iter()
            .map(|u| (u.item.id().0, u.cumulative_wait_secs))
            .collect()
    }

    #[test]
    fn projection_is_a_running_total() {
        let mut clock = clock(DriveMode::FeedDriven);
        let _ = clock.navigate(LabelId(2));
        assert_eq!(waits(&clock), vec![(2, 90.0), (3, 120.0), (1, 180.0)]);

        clock.set_position(0.5);
        assert_eq!(waits(&clock), vec![(2, 45.0), (3, 75.0), (1, 135.0)]);
    }

    #[test]
    fn tick_adds_one_frame_and_stops_at_end() {
        let mut clock = clock(DriveMode::LocalTick);
        assert!(clock.tick(TICK_INTERVAL));
        assert!((clock.position() - 1.0 / 300.0).abs() < 1e-12);

        clock.set_position(0.999);
        assert!(clock.tick(TICK_INTERVAL));
        assert_eq!(clock.position(), 1.0);
        assert!(!clock.tick(TICK_INTERVAL));
        assert_eq!(clock.position(), 1.0);
    }

    #[test]
    fn zero_duration_jumps_to_end() {
        let store = PlaylistStore::load(vec![item(1, 0.0)]).unwrap();
        let mut clock = ProgressClock::new(store, DriveMode::LocalTick);
        assert!(clock.tick(TICK_INTERVAL));
        assert_eq!(clock.position(), 1.0);
    }

    #[test]
    fn authoritative_update_overrides_ticks() {
        let mut clock = clock(DriveMode::LocalTick);
        for _ in 0..50 {
            clock.tick(TICK_INTERVAL);
        }
        assert_eq!(clock.set_authoritative(LabelId(1), 0.1), Rotation::Found);
        assert_eq!(clock.position(), 0.1);
    }

    #[test]
    fn authoritative_label_change_keeps_reported_position() {
        let mut clock = clock(DriveMode::FeedDriven);
        assert!(clock.set_authoritative(LabelId(3), 0.5).is_found());
        let state = clock.state();
        assert_eq!(state.current_label_id, LabelId(3));
        assert_eq!(state.next_label_id, Some(LabelId(1)));
        assert_eq!(state.playback_position, 0.5);
    }

    #[test]
    fn authoritative_unknown_label_is_ignored() {
        let mut clock = clock(DriveMode::FeedDriven);
        let _ = clock.navigate(LabelId(2));
        clock.set_position(0.3);
        assert_eq!(
            clock.set_authoritative(LabelId(42), 0.9),
            Rotation::LabelNotFound(LabelId(42))
        );
        assert_eq!(clock.state().current_label_id, LabelId(2));
        assert_eq!(clock.position(), 0.3);
    }

    #[test]
    fn navigation_resets_position() {
        let mut clock = clock(DriveMode::FeedDriven);
        clock.set_position(0.7);
        assert!(clock.navigate(LabelId(3)).is_found());
        assert_eq!(clock.position(), 0.0);
    }

    #[test]
    fn positions_are_clamped() {
        let mut clock = clock(DriveMode::FeedDriven);
        clock.set_position(1.7);
        assert_eq!(clock.position(), 1.0);
        let _ = clock.set_authoritative(LabelId(1), -0.2);
        assert_eq!(clock.position(), 0.0);
    }
}

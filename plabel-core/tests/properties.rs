use std::time::Duration;

use plabel_core::{
    clock::{DriveMode, ProgressClock},
    playlist::{Label, LabelId, PlaylistItem, PlaylistStore, Video, Work},
};
use proptest::prelude::*;

fn item(id: u64, duration_secs: f64) -> PlaylistItem {
    PlaylistItem {
        label: Label {
            id: LabelId(id),
            title: format!("Label {id}"),
            subtitles: String::new(),
            columns: Vec::new(),
            work: Work::default(),
        },
        video: Video { duration_secs },
    }
}

fn playlist() -> impl Strategy<Value = Vec<PlaylistItem>> {
    prop::collection::vec(0.0f64..600.0, 1..12).prop_map(|durations| {
        durations
            .into_iter()
            .enumerate()
            .map(|(index, duration)| item(index as u64 + 1, duration))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_rotation_is_cyclic_permutation(items in playlist(), pick in any::<prop::sample::Index>()) {
        let order: Vec<LabelId> = items.iter().map(PlaylistItem::id).collect();
        let start = pick.index(order.len());
        let mut store = PlaylistStore::load(items).unwrap();

        prop_assert!(store.rotate_to(order[start]).is_found());
        let view = store.view().label_ids();
        prop_assert_eq!(view.len(), order.len());
        for (offset, label_id) in view.iter().enumerate() {
            prop_assert_eq!(*label_id, order[(start + offset) % order.len()]);
        }
    }

    #[test]
    fn prop_tick_stays_in_range(
        items in playlist(),
        start in 0.0f64..=1.0,
        ticks in 0usize..500,
    ) {
        let store = PlaylistStore::load(items).unwrap();
        let mut clock = ProgressClock::new(store, DriveMode::LocalTick);
        clock.set_position(start);
        let mut previous = clock.position();
        for _ in 0..ticks {
            clock.tick(Duration::from_millis(200));
            prop_assert!(clock.position() >= previous);
            prop_assert!(clock.position() <= 1.0);
            previous = clock.position();
        }
    }

    #[test]
    fn prop_authoritative_position_wins(
        items in playlist(),
        pick in any::<prop::sample::Index>(),
        position in -1.0f64..2.0,
        ticks in 0usize..20,
    ) {
        let ids: Vec<LabelId> = items.iter().map(PlaylistItem::id).collect();
        let label_id = ids[pick.index(ids.len())];
        let store = PlaylistStore::load(items).unwrap();
        let mut clock = ProgressClock::new(store, DriveMode::FeedDriven);
        for _ in 0..ticks {
            clock.tick(Duration::from_millis(200));
        }

        prop_assert!(clock.set_authoritative(label_id, position).is_found());
        prop_assert_eq!(clock.store().current_label_id(), label_id);
        prop_assert_eq!(clock.position(), position.clamp(0.0, 1.0));
    }

    #[test]
    fn prop_upcoming_waits_accumulate(items in playlist(), position in 0.0f64..=1.0) {
        let store = PlaylistStore::load(items).unwrap();
        let mut clock = ProgressClock::new(store, DriveMode::LocalTick);
        clock.set_position(position);
        let upcoming = clock.project_upcoming();
        prop_assert_eq!(upcoming.len(), clock.store().len());
        for pair in upcoming.windows(2) {
            let expected = pair[0].cumulative_wait_secs + pair[1].item.duration_secs();
            prop_assert!((pair[1].cumulative_wait_secs - expected).abs() < 1e-9);
        }
    }
}

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
pub struct Fired<K> {
    pub id: TimerId,
    pub due: Instant,
    pub key: K,
}

struct Entry<K> {
    id: TimerId,
    due: Instant,
    key: K,
}

/// One-shot timers keyed by `K`, polled by the event loop.  Nothing fires on
/// its own, the owner calls `pop_due` with the current time and waits until
/// `next_deadline` in between.
pub struct Timers<K> {
    next_id: u64,
    pending: Vec<Entry<K>>,
}

impl<K> Timers<K> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    pub fn schedule(&mut self, due: Instant, key: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Entry { id, due, key });
        id
    }

    pub fn schedule_after(&mut self, anchor: Instant, offset: Duration, key: K) -> TimerId {
        self.schedule(anchor + offset, key)
    }

    /// Returns false if the timer has already fired or was cancelled before.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.id != id);
        self.pending.len() != before
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|entry| entry.due).min()
    }

    /// Take the earliest timer due at `now`.  Timers with the same deadline
    /// come out in scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Option<Fired<K>> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= now)
            .min_by_key(|(_, entry)| (entry.due, entry.id))
            .map(|(index, _)| index)?;
        let Entry { id, due, key } = self.pending.remove(index);
        Some(Fired { id, due, key })
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.schedule_after(t0, Duration::from_millis(300), "c");
        timers.schedule_after(t0, Duration::from_millis(100), "a");
        timers.schedule_after(t0, Duration::from_millis(100), "b");

        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_millis(100)));
        assert!(timers.pop_due(t0).is_none());

        let now = t0 + Duration::from_millis(500);
        let keys: Vec<_> = std::iter::from_fn(|| timers.pop_due(now))
            .map(|fired| fired.key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancelled_timers_do_not_fire() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        let id = timers.schedule_after(t0, Duration::from_millis(10), 1);
        timers.schedule_after(t0, Duration::from_millis(20), 2);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert_eq!(timers.len(), 1);

        let fired = timers.pop_due(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(fired.key, 2);
        assert_eq!(fired.due, t0 + Duration::from_millis(20));
    }
}

use std::fmt;

const SECS_PER_MINUTE: f64 = 60.0;
const SNAP_SECS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownUnit {
    Second,
    Minute,
}

/// Near-term countdown value.  Below a minute the value snaps to multiples of
/// ten seconds, `should_update` is false for everything in between and for
/// zero, and the previously shown value should stay on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    pub amount: u64,
    pub unit: CountdownUnit,
    pub should_update: bool,
}

impl Countdown {
    pub fn unit_label(&self) -> &'static str {
        match (self.unit, self.amount == 1) {
            (CountdownUnit::Second, true) => "second",
            (CountdownUnit::Second, false) => "seconds",
            (CountdownUnit::Minute, true) => "minute",
            (CountdownUnit::Minute, false) => "minutes",
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit_label())
    }
}

pub fn format_countdown(wait_secs: f64) -> Countdown {
    let wait_secs = wait_secs.max(0.0);
    if wait_secs >= SECS_PER_MINUTE {
        Countdown {
            amount: whole_minutes(wait_secs),
            unit: CountdownUnit::Minute,
            should_update: true,
        }
    } else {
        let amount = wait_secs.round() as u64;
        Countdown {
            amount,
            unit: CountdownUnit::Second,
            should_update: amount != 0 && amount % SNAP_SECS == 0,
        }
    }
}

/// Label for items further down the up-next list, always in minutes.
pub fn minutes_label(wait_secs: f64) -> String {
    let minutes = whole_minutes(wait_secs.max(0.0));
    if minutes == 1 {
        format!("{minutes} minute")
    } else {
        format!("{minutes} minutes")
    }
}

fn whole_minutes(secs: f64) -> u64 {
    (secs / SECS_PER_MINUTE).round() as u64
}

/// Keeps the value currently on screen, so suppressed updates hold the last
/// shown countdown instead of flickering.
#[derive(Default)]
pub struct CountdownDisplay {
    shown: Option<Countdown>,
}

impl CountdownDisplay {
    pub fn new() -> Self {
        Self { shown: None }
    }

    pub fn update(&mut self, wait_secs: f64) -> Option<Countdown> {
        let countdown = format_countdown(wait_secs);
        if countdown.should_update {
            self.shown = Some(countdown);
        }
        self.shown
    }

    /// Start over for a new label.  The first value is shown even off the
    /// ten second grid, so the widget is never blank while time remains.
    pub fn restart(&mut self, wait_secs: f64) -> Option<Countdown> {
        let countdown = format_countdown(wait_secs);
        self.shown = (countdown.amount > 0).then_some(countdown);
        self.shown
    }
}

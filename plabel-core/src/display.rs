use crate::{
    clock::Upcoming,
    countdown::{minutes_label, Countdown},
    playlist::PlaylistItem,
    tap::TapPhase,
};

/// Everything the kiosk screen shows at one moment.  Built fresh on every
/// change and handed to the surface, nothing is read back.
pub struct ViewModel<'a> {
    pub current: &'a PlaylistItem,
    /// Playback position of the current item, in `0.0..=1.0`.
    pub progress: f64,
    /// Value for the near-term countdown widget.  `None` only when the current
    /// label was entered with no time left on it.
    pub countdown: Option<Countdown>,
    pub upcoming: Vec<Upcoming<'a>>,
    pub tap: TapView,
    pub error_text: Option<&'a str>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapView {
    pub phase: TapPhase,
    pub text: &'static str,
    pub class_name: String,
}

pub struct UpNext<'a> {
    /// Position in the up-next list, starting at 1.
    pub index: usize,
    pub item: &'a PlaylistItem,
    /// Seconds until this item starts playing.
    pub wait_secs: f64,
    pub wait_label: String,
}

impl<'a> ViewModel<'a> {
    pub fn title_annotation(&self) -> Option<&'a str> {
        self.current.label.work.title_annotation.as_deref()
    }

    pub fn is_context_indigenous(&self) -> bool {
        self.current.label.work.is_context_indigenous
    }

    pub fn next_title(&self) -> Option<&'a str> {
        self.upcoming
            .get(1)
            .map(|upcoming| upcoming.item.label.title.as_str())
    }

    pub fn up_next(&self) -> Vec<UpNext<'a>> {
        self.upcoming
            .windows(2)
            .enumerate()
            .map(|(index, pair)| UpNext {
                index: index + 1,
                item: pair[1].item,
                wait_secs: pair[0].cumulative_wait_secs,
                wait_label: minutes_label(pair[0].cumulative_wait_secs),
            })
            .collect()
    }
}

pub trait DisplaySurface {
    fn render(&mut self, view: &ViewModel<'_>);
}

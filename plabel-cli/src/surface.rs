use plabel_core::{
    countdown::Countdown,
    display::{DisplaySurface, ViewModel},
    playlist::LabelId,
    tap::TapPhase,
};

/// Headless surface writing screen changes to the log.  Only what changed
/// since the previous frame is reported.
#[derive(Default)]
pub struct LogSurface {
    label: Option<LabelId>,
    countdown: Option<Countdown>,
    tap: Option<TapPhase>,
    error_shown: bool,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySurface for LogSurface {
    fn render(&mut self, view: &ViewModel<'_>) {
        let label = view.current.id();
        if self.label != Some(label) {
            self.label = Some(label);
            let title = &view.current.label.title;
            match view.title_annotation() {
                Some(annotation) => log::info!("now showing {}: {} {}", label, title, annotation),
                None => log::info!("now showing {}: {}", label, title),
            }
            if view.is_context_indigenous() {
                log::info!("indigenous context notice shown");
            }
            for up_next in view.up_next() {
                log::info!(
                    "  {}. {} in {}",
                    up_next.index,
                    up_next.item.label.title,
                    up_next.wait_label
                );
            }
        }
        log::debug!("progress {:.3}", view.progress);

        if self.countdown != view.countdown {
            self.countdown = view.countdown;
            if let (Some(countdown), Some(next)) = (view.countdown, view.next_title()) {
                log::info!("{} starts in {}", next, countdown);
            }
        }

        if self.tap != Some(view.tap.phase) {
            self.tap = Some(view.tap.phase);
            log::info!("tap: {} ({})", view.tap.text, view.tap.class_name);
        }

        if self.error_shown != view.error_text.is_some() {
            self.error_shown = view.error_text.is_some();
            match view.error_text {
                Some(text) => log::warn!("error dialogue: {}", text.replace('\n', " ")),
                None => log::info!("error dialogue closed"),
            }
        }
    }
}

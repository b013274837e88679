use crossbeam_channel::Sender;

use crate::timefmt::{format_position, format_precise};
use crate::LoopState;

/// Label changes headed for the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayUpdate {
    Position { ms: u64, label: String },
    Bounds { start_ms: u64, end_ms: u64, start_label: String, end_label: String },
}

impl DisplayUpdate {
    pub fn position(ms: u64) -> Self {
        DisplayUpdate::Position { ms, label: format_position(ms) }
    }

    pub fn bounds(state: &LoopState) -> Self {
        DisplayUpdate::Bounds {
            start_ms: state.start_ms,
            end_ms: state.end_ms,
            start_label: format_precise(state.start_ms),
            end_label: format_precise(state.end_ms),
        }
    }
}

/// Receives label updates from the controller and the watchdog thread.
///
/// Implementations must not touch UI state directly; they hand the update to
/// whatever context owns the UI.
pub trait DisplaySink: Send + Sync {
    fn publish(&self, update: DisplayUpdate);
}

/// Forwards updates over a channel drained by the UI context.
pub struct ChannelSink {
    sender: Sender<DisplayUpdate>,
    wake: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<DisplayUpdate>) -> Self {
        Self { sender, wake: None }
    }

    /// `wake` runs after every send, e.g. to request a repaint.
    pub fn with_wake(
        sender: Sender<DisplayUpdate>,
        wake: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self { sender, wake: Some(Box::new(wake)) }
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&self, update: DisplayUpdate) {
        // A closed UI is not the watchdog's problem.
        if self.sender.try_send(update).is_ok() {
            if let Some(wake) = &self.wake {
                wake();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn bounds_update_uses_precise_labels() {
        let state = LoopState { start_ms: 61_234, end_ms: 3_599_000, total_ms: 3_600_000 };
        assert_eq!(
            DisplayUpdate::bounds(&state),
            DisplayUpdate::Bounds {
                start_ms: 61_234,
                end_ms: 3_599_000,
                start_label: "1:01.234".into(),
                end_label: "59:59.000".into(),
            }
        );
        assert_eq!(
            DisplayUpdate::position(61_234),
            DisplayUpdate::Position { ms: 61_234, label: "1:01".into() }
        );
    }

    #[test]
    fn channel_sink_wakes_after_send() {
        let (tx, rx) = unbounded();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        let sink = ChannelSink::with_wake(tx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sink.publish(DisplayUpdate::position(1_000));
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::position(1_000));
        assert_eq!(wakes.load(Ordering::SeqCst), 1);

        drop(rx);
        sink.publish(DisplayUpdate::position(2_000));
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }
}

use crossbeam_channel::Receiver;

/// What the range control and the buttons can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Both handles of the range control, in milliseconds.
    RangeChanged { min: u64, max: u64 },
    MarkStart,
    MarkEnd,
    TogglePlayback,
}

/// A queue of pending input events, drained by the UI context.
pub trait RangeInputSource {
    fn poll_input(&mut self) -> Option<InputEvent>;
}

impl RangeInputSource for Receiver<InputEvent> {
    fn poll_input(&mut self) -> Option<InputEvent> {
        self.try_recv().ok()
    }
}

impl RangeInputSource for std::collections::VecDeque<InputEvent> {
    fn poll_input(&mut self) -> Option<InputEvent> {
        self.pop_front()
    }
}

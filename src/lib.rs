pub mod audio;
pub mod controller;
pub mod display;
pub mod engine;
pub mod export;
pub mod gui;
pub mod i18n;
pub mod input;
pub mod player;
pub mod timefmt;
pub mod watchdog;

pub use controller::{ControllerConfig, ControllerState, LoopController};
pub use display::{ChannelSink, DisplaySink, DisplayUpdate};
pub use engine::{MediaLoadError, PlaybackEngine, TrackSource, TransientSeekError};
pub use input::{InputEvent, RangeInputSource};

/// A/B loop bounds for the loaded track, in milliseconds.
///
/// Always satisfies `start_ms <= end_ms <= total_ms`; every constructor and
/// mutator clamps instead of failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopState {
    pub start_ms: u64,
    pub end_ms: u64,
    pub total_ms: u64,
}

impl LoopState {
    /// The whole track: `[0, total_ms]`.
    pub fn full(total_ms: u64) -> Self {
        Self { start_ms: 0, end_ms: total_ms, total_ms }
    }

    /// Start is clamped into the track, then end is clamped into `[start, total]`.
    pub fn clamped(&self, start_ms: u64, end_ms: u64) -> Self {
        let start_ms = start_ms.min(self.total_ms);
        let end_ms = end_ms.clamp(start_ms, self.total_ms);
        Self { start_ms, end_ms, total_ms: self.total_ms }
    }

    /// Moves the start to `position_ms` without ever pushing the end.
    pub fn with_start(&self, position_ms: u64) -> Self {
        self.clamped(position_ms.min(self.end_ms), self.end_ms)
    }

    /// Moves the end to `position_ms` without ever pushing the start.
    pub fn with_end(&self, position_ms: u64) -> Self {
        self.clamped(self.start_ms, position_ms.max(self.start_ms))
    }

    pub fn len_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, position_ms: u64) -> bool {
        (self.start_ms..=self.end_ms).contains(&position_ms)
    }
}

/// What a successful load reports back about the track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackInfo {
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(state: &LoopState) {
        assert!(state.start_ms <= state.end_ms, "{:?}", state);
        assert!(state.end_ms <= state.total_ms, "{:?}", state);
    }

    #[test]
    fn full_covers_track() {
        let state = LoopState::full(120_000);
        assert_eq!((state.start_ms, state.end_ms), (0, 120_000));
        assert_eq!(state.len_ms(), 120_000);
    }

    #[test]
    fn clamped_keeps_invariant() {
        let base = LoopState::full(10_000);
        let requests = [
            (0, 0),
            (500, 400),
            (20_000, 30_000),
            (9_999, 10_001),
            (u64::MAX, 0),
            (3_000, u64::MAX),
        ];
        for (start, end) in requests {
            assert_invariant(&base.clamped(start, end));
        }
        assert_eq!(
            base.clamped(500, 400),
            LoopState { start_ms: 500, end_ms: 500, total_ms: 10_000 }
        );
        assert_eq!(
            base.clamped(20_000, 30_000),
            LoopState { start_ms: 10_000, end_ms: 10_000, total_ms: 10_000 }
        );
    }

    #[test]
    fn marks_never_move_the_other_bound() {
        let state = LoopState::full(120_000).with_start(5_000);
        assert_eq!((state.start_ms, state.end_ms), (5_000, 120_000));

        let state = state.with_end(3_000);
        assert_eq!((state.start_ms, state.end_ms), (5_000, 5_000));

        let state = LoopState::full(120_000).with_end(40_000).with_start(90_000);
        assert_eq!((state.start_ms, state.end_ms), (40_000, 40_000));
    }

    #[test]
    fn contains_is_inclusive() {
        let state = LoopState::full(10_000).clamped(1_000, 2_000);
        assert!(state.contains(1_000));
        assert!(state.contains(2_000));
        assert!(!state.contains(2_001));
        assert!(!state.contains(999));
    }
}

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::display::{DisplaySink, DisplayUpdate};
use crate::engine::{MediaLoadError, PlaybackEngine, TrackSource, TransientSeekError};
use crate::input::{InputEvent, RangeInputSource};
use crate::watchdog::{self, TickOutcome, Watchdog, WatchdogConfig};
use crate::{LoopState, TrackInfo};

pub const MIN_TICK: Duration = Duration::from_millis(10);
pub const MAX_TICK: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// How often the watchdog checks the playback position.
    pub tick_interval: Duration,
    /// Also send playback back to the start when it is before the loop.
    pub strict: bool,
    /// Start playback as soon as a track is loaded.
    pub autoplay: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            strict: true,
            autoplay: true,
        }
    }
}

impl ControllerConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.clamp(MIN_TICK, MAX_TICK);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// No track loaded, no watchdog.
    Idle,
    /// Track loaded and the watchdog is enforcing the loop.
    Looping,
}

struct Session {
    track: TrackInfo,
    state: Arc<Mutex<LoopState>>,
    watchdog: Watchdog,
    suspended: bool,
}

/// Keeps playback inside the A/B loop of the current track.
pub struct LoopController {
    engine: Arc<dyn PlaybackEngine>,
    sink: Arc<dyn DisplaySink>,
    config: ControllerConfig,
    session: Option<Session>,
}

impl LoopController {
    pub fn new(
        engine: Arc<dyn PlaybackEngine>,
        sink: Arc<dyn DisplaySink>,
        config: ControllerConfig,
    ) -> Self {
        Self { engine, sink, config, session: None }
    }

    pub fn state(&self) -> ControllerState {
        match self.session {
            Some(_) => ControllerState::Looping,
            None => ControllerState::Idle,
        }
    }

    pub fn bounds(&self) -> Option<LoopState> {
        self.session
            .as_ref()
            .map(|session| *session.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn track(&self) -> Option<&TrackInfo> {
        self.session.as_ref().map(|session| &session.track)
    }

    /// Replaces the current session with one for `source`.
    ///
    /// The old session is torn down first, so on error the controller is Idle.
    pub fn load(&mut self, source: &TrackSource) -> Result<TrackInfo, MediaLoadError> {
        self.unload();

        let track = match self.engine.load(source) {
            Ok(track) => track,
            Err(e) => {
                warn!("failed to load {:?}: {}", source, e);
                return Err(e);
            }
        };

        let state = LoopState::full(track.duration_ms);
        self.sink.publish(DisplayUpdate::bounds(&state));
        self.sink.publish(DisplayUpdate::position(0));

        if self.config.autoplay {
            self.engine.start();
        }

        let state = Arc::new(Mutex::new(state));
        let watchdog = Watchdog::spawn(
            self.engine.clone(),
            state.clone(),
            self.sink.clone(),
            WatchdogConfig { interval: self.config.tick_interval, strict: self.config.strict },
        );

        info!(
            "looping {} ({} ms)",
            track.title.as_deref().unwrap_or("untitled track"),
            track.duration_ms
        );
        self.session = Some(Session { track: track.clone(), state, watchdog, suspended: false });
        Ok(track)
    }

    /// Ends the current session, if any.
    pub fn unload(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.watchdog.cancel();
            self.engine.stop();
            debug!("session ended");
        }
    }

    /// Stores new bounds, clamped into the track with the start taking priority.
    ///
    /// Moving the start seeks there right away. Returns `None` when Idle.
    pub fn set_bounds(&self, start_ms: u64, end_ms: u64) -> Option<LoopState> {
        let session = self.session.as_ref()?;
        Some(self.commit(session, |state| state.clamped(start_ms, end_ms)))
    }

    /// Uses the playback position as the new loop start, never past the end.
    pub fn mark_start_at_current_position(&self) -> Option<LoopState> {
        let session = self.session.as_ref()?;
        let position = self.position_for_mark()?;
        Some(self.commit(session, |state| state.with_start(position)))
    }

    /// Uses the playback position as the new loop end, never before the start.
    pub fn mark_end_at_current_position(&self) -> Option<LoopState> {
        let session = self.session.as_ref()?;
        let position = self.position_for_mark()?;
        Some(self.commit(session, |state| state.with_end(position)))
    }

    /// Runs one watchdog iteration on the calling thread.
    pub fn tick_now(&self) -> Option<Result<TickOutcome, TransientSeekError>> {
        let session = self.session.as_ref()?;
        Some(watchdog::tick(
            self.engine.as_ref(),
            &session.state,
            self.sink.as_ref(),
            self.config.strict,
        ))
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::RangeChanged { min, max } => {
                self.set_bounds(min, max);
            }
            InputEvent::MarkStart => {
                self.mark_start_at_current_position();
            }
            InputEvent::MarkEnd => {
                self.mark_end_at_current_position();
            }
            InputEvent::TogglePlayback => {
                self.toggle_playback();
            }
        }
    }

    /// Applies every pending event, returns how many there were.
    pub fn pump(&mut self, input: &mut dyn RangeInputSource) -> usize {
        let mut applied = 0;
        while let Some(event) = input.poll_input() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Returns whether the engine is playing afterwards.
    pub fn toggle_playback(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.suspended = false;
        if self.engine.is_playing() {
            self.engine.pause();
            false
        } else {
            self.engine.start();
            true
        }
    }

    /// Pauses for the host going into the background.
    pub fn suspend(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if self.engine.is_playing() {
                self.engine.pause();
                session.suspended = true;
            }
        }
    }

    /// Undoes [`suspend`](Self::suspend); a pause the user asked for stays.
    pub fn resume(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.suspended {
                self.engine.start();
                session.suspended = false;
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some() && self.engine.is_playing()
    }

    fn position_for_mark(&self) -> Option<u64> {
        match self.engine.current_position() {
            Ok(position) => Some(position),
            Err(e) => {
                warn!("cannot mark loop bound: {}", e);
                None
            }
        }
    }

    fn commit(&self, session: &Session, update: impl FnOnce(&LoopState) -> LoopState) -> LoopState {
        let (previous, next) = {
            let mut state = session.state.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = *state;
            *state = update(&previous);
            (previous, *state)
        };

        if next.start_ms != previous.start_ms {
            if let Err(e) = self.engine.seek(next.start_ms) {
                warn!("seek to new loop start failed: {}", e);
            }
        }
        if next != previous {
            debug!("loop bounds {}..{} ms", next.start_ms, next.end_ms);
        }

        self.sink.publish(DisplayUpdate::bounds(&next));
        next
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        self.unload();
    }
}

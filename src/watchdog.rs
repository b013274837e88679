use crossbeam_channel::{bounded, select, tick as ticker, Sender};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::display::{DisplaySink, DisplayUpdate};
use crate::engine::{PlaybackEngine, TransientSeekError};
use crate::LoopState;

/// Consecutive failed ticks before a transient engine error is logged as a warning.
pub const TRANSIENT_WARN_AFTER: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Position was inside the loop.
    Held { position_ms: u64 },
    /// Position had left the loop and was sent back to the start.
    Resynced { from_ms: u64, to_ms: u64 },
}

impl TickOutcome {
    /// The position published to the display.
    pub fn position_ms(&self) -> u64 {
        match *self {
            TickOutcome::Held { position_ms } => position_ms,
            TickOutcome::Resynced { to_ms, .. } => to_ms,
        }
    }
}

/// One watchdog iteration: a position read, at most one seek, one publish.
///
/// With `strict` set, a position before the loop start is also sent back to
/// the start; otherwise only running past the end is corrected.
pub fn tick(
    engine: &dyn PlaybackEngine,
    state: &Mutex<LoopState>,
    sink: &dyn DisplaySink,
    strict: bool,
) -> Result<TickOutcome, TransientSeekError> {
    let position = engine.current_position()?;
    let bounds = *state.lock().unwrap_or_else(PoisonError::into_inner);

    let outside = if strict {
        !bounds.contains(position)
    } else {
        position > bounds.end_ms
    };
    let outcome = if outside {
        engine.seek(bounds.start_ms)?;
        TickOutcome::Resynced { from_ms: position, to_ms: bounds.start_ms }
    } else {
        TickOutcome::Held { position_ms: position }
    };

    sink.publish(DisplayUpdate::position(outcome.position_ms()));
    Ok(outcome)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub interval: Duration,
    pub strict: bool,
}

/// Background thread that keeps playback inside the loop.
///
/// Dropping the handle cancels the thread and waits for it to exit.
pub struct Watchdog {
    cancel: Option<Sender<()>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn spawn(
        engine: Arc<dyn PlaybackEngine>,
        state: Arc<Mutex<LoopState>>,
        sink: Arc<dyn DisplaySink>,
        config: WatchdogConfig,
    ) -> Self {
        // Nothing is ever sent; dropping the sender wakes the select below.
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let handle = thread::spawn(move || {
            let ticks = ticker(config.interval);
            let mut failures: u32 = 0;
            debug!("watchdog started ({:?}, strict: {})", config.interval, config.strict);

            loop {
                select! {
                    recv(cancel_rx) -> _ => break,
                    recv(ticks) -> _ => {}
                }
                if flag.load(Ordering::Acquire) {
                    break;
                }

                match tick(engine.as_ref(), &state, sink.as_ref(), config.strict) {
                    Ok(outcome) => {
                        failures = 0;
                        if let TickOutcome::Resynced { from_ms, to_ms } = outcome {
                            debug!("resync {} -> {}", from_ms, to_ms);
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        if failures == TRANSIENT_WARN_AFTER {
                            warn!("watchdog skipped {} ticks in a row: {}", failures, e);
                        } else {
                            debug!("watchdog tick skipped: {}", e);
                        }
                    }
                }
            }
            debug!("watchdog stopped");
        });

        Self { cancel: Some(cancel_tx), cancelled, handle: Some(handle) }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the thread and joins it. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancel.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

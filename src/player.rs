use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::info;
use rodio::{OutputStreamHandle, PlayError, Sink, Source};

use crate::audio::{self, frames_to_ms, ms_to_frames, AudioData};
use crate::engine::{MediaLoadError, PlaybackEngine, TrackSource, TransientSeekError};
use crate::TrackInfo;

const NO_SEEK: usize = usize::MAX;

/// Playback position shared between the audio thread and everyone else.
pub struct Playhead {
    frame: AtomicUsize,
    pending_seek: AtomicUsize,
    stopped: AtomicBool,
}

impl Playhead {
    pub fn new() -> Self {
        Self {
            frame: AtomicUsize::new(0),
            pending_seek: AtomicUsize::new(NO_SEEK),
            stopped: AtomicBool::new(false),
        }
    }

    /// The frame about to be played, or the seek target if the audio thread
    /// has not picked it up yet.
    pub fn frame(&self) -> usize {
        match self.pending_seek.load(Ordering::Acquire) {
            NO_SEEK => self.frame.load(Ordering::Acquire),
            target => target,
        }
    }

    pub fn request_seek(&self, frame: usize) {
        self.pending_seek.store(frame, Ordering::Release);
    }

    pub fn retire(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new()
    }
}

/// Plays a decoded track from the start, wrapping around at the end forever.
/// Seeks land on the next frame boundary.
pub struct LoopingSource {
    data: Arc<AudioData>,
    playhead: Arc<Playhead>,
    cursor: usize,
    len: usize,
}

impl LoopingSource {
    pub fn new(data: Arc<AudioData>, playhead: Arc<Playhead>) -> Self {
        let len = data.frames() * data.channels as usize;
        Self { data, playhead, cursor: 0, len }
    }
}

impl Iterator for LoopingSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 || self.playhead.stopped.load(Ordering::Acquire) {
            return None;
        }

        let channels = self.data.channels as usize;
        if self.cursor % channels == 0 {
            let target = self.playhead.pending_seek.swap(NO_SEEK, Ordering::AcqRel);
            if target != NO_SEEK {
                self.cursor = target.saturating_mul(channels);
            }
            if self.cursor >= self.len {
                self.cursor = 0;
            }
            self.playhead.frame.store(self.cursor / channels, Ordering::Release);
        }

        let sample = self.data.samples[self.cursor];
        self.cursor += 1;
        Some(sample)
    }
}

impl Source for LoopingSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.data.channels
    }

    fn sample_rate(&self) -> u32 {
        self.data.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

struct LoadedTrack {
    playhead: Arc<Playhead>,
    sample_rate: u32,
    frames: usize,
    duration_ms: u64,
}

/// [`PlaybackEngine`] backed by a rodio [`Sink`].
///
/// The output stream itself is not `Send`, so the caller keeps it alive and
/// hands over its handle.
pub struct RodioEngine {
    sink: Sink,
    current: Mutex<Option<LoadedTrack>>,
}

impl RodioEngine {
    pub fn new(handle: &OutputStreamHandle) -> Result<Self, PlayError> {
        let sink = Sink::try_new(handle)?;
        sink.pause();
        Ok(Self { sink, current: Mutex::new(None) })
    }

    /// Engine on a sink with no output device; the queue is never pulled.
    #[cfg(test)]
    fn detached() -> (Self, rodio::queue::SourcesQueueOutput<f32>) {
        let (sink, queue) = Sink::new_idle();
        sink.pause();
        (Self { sink, current: Mutex::new(None) }, queue)
    }

    pub fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn with_track<T>(&self, f: impl FnOnce(&LoadedTrack) -> T) -> Result<T, TransientSeekError> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.as_ref().map(f).ok_or(TransientSeekError::NotPrepared)
    }
}

impl PlaybackEngine for RodioEngine {
    fn load(&self, source: &TrackSource) -> Result<TrackInfo, MediaLoadError> {
        let data = audio::decode(source)?;
        let info = data.info();

        self.stop();
        let playhead = Arc::new(Playhead::new());
        self.sink.append(LoopingSource::new(data.clone(), playhead.clone()));

        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(LoadedTrack {
            playhead,
            sample_rate: data.sample_rate,
            frames: data.frames(),
            duration_ms: info.duration_ms,
        });
        info!(
            "loaded track: {} ms, {} Hz, {} ch",
            info.duration_ms, info.sample_rate, info.channels
        );
        Ok(info)
    }

    fn start(&self) {
        if self.current.lock().unwrap_or_else(PoisonError::into_inner).is_some() {
            self.sink.play();
        }
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn stop(&self) {
        self.sink.pause();
        if let Some(track) = self.current.lock().unwrap_or_else(PoisonError::into_inner).take() {
            track.playhead.retire();
        }
    }

    fn seek(&self, position_ms: u64) -> Result<(), TransientSeekError> {
        self.with_track(|track| {
            // The source wraps a cursor at `frames` to 0, so stay on the last frame.
            let last = track.frames.saturating_sub(1);
            let frame = ms_to_frames(position_ms, track.sample_rate).min(last);
            track.playhead.request_seek(frame);
        })
    }

    fn current_position(&self) -> Result<u64, TransientSeekError> {
        self.with_track(|track| frames_to_ms(track.playhead.frame(), track.sample_rate))
    }

    fn duration(&self) -> u64 {
        self.with_track(|track| track.duration_ms).unwrap_or(0)
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused()
            && self.current.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: u16) -> Arc<AudioData> {
        let samples = (0..frames * channels as usize).map(|i| i as f32).collect();
        Arc::new(AudioData {
            samples,
            sample_rate: 1_000,
            channels,
            title: None,
            artist: None,
            album: None,
            cover_art: None,
        })
    }

    #[test]
    fn wraps_to_the_start() {
        let playhead = Arc::new(Playhead::new());
        let source = LoopingSource::new(ramp(3, 1), playhead);
        let played: Vec<f32> = source.take(7).collect();
        assert_eq!(played, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn seek_waits_for_frame_boundary() {
        let playhead = Arc::new(Playhead::new());
        let mut source = LoopingSource::new(ramp(10, 2), playhead.clone());

        assert_eq!(source.next(), Some(0.0));
        playhead.request_seek(5);
        assert_eq!(playhead.frame(), 5);
        // Right channel of frame 0 still plays.
        assert_eq!(source.next(), Some(1.0));
        assert_eq!(source.next(), Some(10.0));
        assert_eq!(source.next(), Some(11.0));
        assert_eq!(playhead.frame(), 5);
    }

    #[test]
    fn seek_past_end_wraps() {
        let playhead = Arc::new(Playhead::new());
        let mut source = LoopingSource::new(ramp(4, 1), playhead.clone());
        playhead.request_seek(99);
        assert_eq!(source.next(), Some(0.0));
    }

    #[test]
    fn retired_source_ends() {
        let playhead = Arc::new(Playhead::new());
        let mut source = LoopingSource::new(ramp(4, 1), playhead.clone());
        assert!(source.next().is_some());
        playhead.retire();
        assert_eq!(source.next(), None);
    }

    fn loaded_engine(frames: usize) -> (RodioEngine, rodio::queue::SourcesQueueOutput<f32>) {
        let (engine, queue) = RodioEngine::detached();
        let info = engine.load(&TrackSource::Decoded(ramp(frames, 1))).unwrap();
        assert_eq!(info.duration_ms, frames as u64);
        (engine, queue)
    }

    fn playhead_of(engine: &RodioEngine) -> Arc<Playhead> {
        engine.current.lock().unwrap().as_ref().unwrap().playhead.clone()
    }

    #[test]
    fn unloaded_engine_is_not_prepared() {
        let (engine, _queue) = RodioEngine::detached();
        assert_eq!(engine.seek(100), Err(TransientSeekError::NotPrepared));
        assert_eq!(engine.current_position(), Err(TransientSeekError::NotPrepared));
        assert_eq!(engine.duration(), 0);
        engine.start();
        assert!(!engine.is_playing());
    }

    #[test]
    fn empty_decoded_track_fails_to_load() {
        let (engine, _queue) = RodioEngine::detached();
        let err = engine.load(&TrackSource::Decoded(ramp(0, 1))).err();
        assert!(matches!(err, Some(MediaLoadError::Empty)));
        assert_eq!(engine.current_position(), Err(TransientSeekError::NotPrepared));
    }

    #[test]
    fn pending_seek_is_reported_as_position() {
        let (engine, _queue) = loaded_engine(2_000);
        assert_eq!(engine.current_position(), Ok(0));
        assert_eq!(engine.duration(), 2_000);

        engine.seek(500).unwrap();
        assert_eq!(engine.current_position(), Ok(500));
    }

    #[test]
    fn seek_stays_on_last_frame() {
        let (engine, _queue) = loaded_engine(2_000);

        engine.seek(2_000).unwrap();
        assert_eq!(engine.current_position(), Ok(1_999));
        engine.seek(99_999).unwrap();
        assert_eq!(engine.current_position(), Ok(1_999));

        // The source lands on the last frame instead of wrapping to the start.
        let mut source = LoopingSource::new(ramp(2_000, 1), playhead_of(&engine));
        assert_eq!(source.next(), Some(1_999.0));
        assert_eq!(engine.current_position(), Ok(1_999));
    }

    #[test]
    fn start_and_pause_follow_the_sink() {
        let (engine, _queue) = loaded_engine(1_000);
        assert!(!engine.is_playing());
        engine.start();
        assert!(engine.is_playing());
        engine.pause();
        assert!(!engine.is_playing());
    }

    #[test]
    fn stop_retires_the_playhead() {
        let (engine, _queue) = loaded_engine(1_000);
        engine.start();
        let playhead = playhead_of(&engine);

        engine.stop();
        assert!(!engine.is_playing());
        assert_eq!(engine.current_position(), Err(TransientSeekError::NotPrepared));
        assert_eq!(engine.duration(), 0);
        let mut source = LoopingSource::new(ramp(1_000, 1), playhead);
        assert_eq!(source.next(), None);
    }

    #[test]
    fn reload_retires_previous_track() {
        let (engine, _queue) = loaded_engine(1_000);
        let first = playhead_of(&engine);

        engine.load(&TrackSource::Decoded(ramp(3_000, 1))).unwrap();
        assert!(first.stopped.load(Ordering::Acquire));
        assert_eq!(engine.duration(), 3_000);
        assert_eq!(engine.current_position(), Ok(0));
    }
}

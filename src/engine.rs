use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::AudioData;
use crate::TrackInfo;

/// Where a track comes from.
#[derive(Clone)]
pub enum TrackSource {
    Path(PathBuf),
    Bytes { data: Vec<u8>, extension: Option<String> },
    /// Already decoded, e.g. by a loader thread.
    Decoded(Arc<AudioData>),
}

impl fmt::Debug for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            TrackSource::Bytes { data, extension } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("extension", extension)
                .finish(),
            TrackSource::Decoded(data) => f
                .debug_struct("Decoded")
                .field("sample_rate", &data.sample_rate)
                .field("channels", &data.channels)
                .field("frames", &data.frames())
                .finish(),
        }
    }
}

/// The track could not be opened, probed or decoded.
#[derive(Debug)]
pub enum MediaLoadError {
    Open(std::io::Error),
    UnsupportedFormat(String),
    NoAudioTrack,
    UnsupportedCodec(String),
    /// Decoding produced no audio.
    Empty,
}

impl fmt::Display for MediaLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaLoadError::Open(err) => write!(f, "failed to open audio file: {}", err),
            MediaLoadError::UnsupportedFormat(message) => {
                write!(f, "unsupported format: {}", message)
            }
            MediaLoadError::NoAudioTrack => write!(f, "no supported audio track"),
            MediaLoadError::UnsupportedCodec(message) => {
                write!(f, "unsupported codec: {}", message)
            }
            MediaLoadError::Empty => write!(f, "track contains no audio"),
        }
    }
}

impl std::error::Error for MediaLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MediaLoadError::Open(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MediaLoadError {
    fn from(err: std::io::Error) -> MediaLoadError {
        MediaLoadError::Open(err)
    }
}

/// A seek or position query that failed for now but may succeed next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientSeekError {
    /// Nothing is loaded yet.
    NotPrepared,
    Unavailable(String),
}

impl fmt::Display for TransientSeekError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransientSeekError::NotPrepared => write!(f, "playback engine not prepared"),
            TransientSeekError::Unavailable(message) => {
                write!(f, "playback engine unavailable: {}", message)
            }
        }
    }
}

impl std::error::Error for TransientSeekError {}

/// Decoding and audio output, as seen by the loop controller.
///
/// All methods take `&self` because the engine is shared between the UI
/// context and the watchdog thread.
pub trait PlaybackEngine: Send + Sync {
    /// Replaces whatever is loaded. Does not start playback.
    fn load(&self, source: &TrackSource) -> Result<TrackInfo, MediaLoadError>;

    fn start(&self);

    fn pause(&self);

    /// Stops and unloads.
    fn stop(&self);

    fn seek(&self, position_ms: u64) -> Result<(), TransientSeekError>;

    fn current_position(&self) -> Result<u64, TransientSeekError>;

    /// Zero when nothing is loaded.
    fn duration(&self) -> u64;

    fn is_playing(&self) -> bool;
}

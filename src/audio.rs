use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;

use image::DynamicImage;
use log::{debug, warn};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::engine::{MediaLoadError, TrackSource};
use crate::TrackInfo;

#[derive(Clone)]
pub struct AudioData {
    pub samples: Vec<f32>, // Interleaved samples
    pub sample_rate: u32,
    pub channels: u16,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub cover_art: Option<Arc<DynamicImage>>,
}

impl AudioData {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        frames_to_ms(self.frames(), self.sample_rate)
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            duration_ms: self.duration_ms(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
        }
    }
}

pub fn frames_to_ms(frames: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames as u64 * 1000 / sample_rate as u64
}

pub fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Decodes any [`TrackSource`] into memory.
pub fn decode(source: &TrackSource) -> Result<Arc<AudioData>, MediaLoadError> {
    match source {
        TrackSource::Path(path) => load_audio_file(path).map(Arc::new),
        TrackSource::Bytes { data, extension } => {
            load_audio_from_bytes(data.clone(), extension.as_deref()).map(Arc::new)
        }
        TrackSource::Decoded(data) => {
            if data.frames() == 0 || data.sample_rate == 0 {
                return Err(MediaLoadError::Empty);
            }
            Ok(data.clone())
        }
    }
}

pub fn load_audio_from_source(
    source: Box<dyn MediaSource>,
    hint: &Hint,
) -> Result<AudioData, MediaLoadError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let mut probed = symphonia::default::get_probe()
        .format(hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| MediaLoadError::UnsupportedFormat(e.to_string()))?;

    let mut title = None;
    let mut artist = None;
    let mut album = None;
    let mut cover_art = None;

    if let Some(metadata) = probed.format.metadata().current() {
        for tag in metadata.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => title = Some(tag.value.to_string()),
                Some(StandardTagKey::Artist) => artist = Some(tag.value.to_string()),
                Some(StandardTagKey::Album) => album = Some(tag.value.to_string()),
                _ => (),
            }
        }

        if let Some(visual) = metadata.visuals().first() {
            match image::load_from_memory(&visual.data) {
                Ok(img) => cover_art = Some(Arc::new(img)),
                Err(e) => debug!("ignoring unreadable cover art: {}", e),
            }
        }
    }

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(MediaLoadError::NoAudioTrack)?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| MediaLoadError::UnsupportedCodec(e.to_string()))?;

    let track_id = track.id;
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream shows up as an unexpected EOF.
            Err(Error::IoError(_)) => break,
            Err(e) => {
                debug!("stopping demux: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_rate == 0 {
                    let spec = decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                }

                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                });
                if buf.capacity() < decoded.capacity() * decoded.spec().channels.count() {
                    *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                }
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(Error::DecodeError(e)) => warn!("skipping corrupt packet: {}", e),
            Err(e) => {
                debug!("stopping decode: {}", e);
                break;
            }
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(MediaLoadError::Empty);
    }

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
        title,
        artist,
        album,
        cover_art,
    })
}

pub fn load_audio_file<P: AsRef<Path>>(path: P) -> Result<AudioData, MediaLoadError> {
    let src = File::open(&path)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.as_ref().extension() {
        if let Some(ext_str) = ext.to_str() {
            hint.with_extension(ext_str);
        }
    }

    load_audio_from_source(Box::new(src), &hint)
}

pub fn load_audio_from_bytes(
    data: Vec<u8>,
    extension_hint: Option<&str>,
) -> Result<AudioData, MediaLoadError> {
    let src = Cursor::new(data);

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    load_audio_from_source(Box::new(src), &hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec).unwrap();
            for i in 0..frames * channels as usize {
                let value = ((i % 100) as i16 - 50) * 200;
                writer.write_sample(value).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn decodes_wav_bytes() {
        let data = load_audio_from_bytes(wav_bytes(8_000, 2, 16_000), Some("wav")).unwrap();
        assert_eq!(data.sample_rate, 8_000);
        assert_eq!(data.channels, 2);
        assert_eq!(data.frames(), 16_000);
        assert_eq!(data.duration_ms(), 2_000);
        assert!(data.samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn garbage_is_a_load_error() {
        let err = load_audio_from_bytes(b"definitely not audio".to_vec(), None).err();
        assert!(matches!(err, Some(MediaLoadError::UnsupportedFormat(_))), "{:?}", err);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = load_audio_file("/nonexistent/strumline/track.mp3").err();
        assert!(matches!(err, Some(MediaLoadError::Open(_))), "{:?}", err);
    }

    #[test]
    fn decoded_source_must_have_audio() {
        let empty = AudioData {
            samples: Vec::new(),
            sample_rate: 44_100,
            channels: 2,
            title: None,
            artist: None,
            album: None,
            cover_art: None,
        };
        let err = decode(&TrackSource::Decoded(Arc::new(empty))).err();
        assert!(matches!(err, Some(MediaLoadError::Empty)));
    }

    #[test]
    fn ms_frame_conversions() {
        assert_eq!(ms_to_frames(1_500, 44_100), 66_150);
        assert_eq!(frames_to_ms(66_150, 44_100), 1_500);
        assert_eq!(frames_to_ms(10, 0), 0);
    }
}

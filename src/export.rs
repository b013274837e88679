use std::fmt;
use std::io::Cursor;
use std::path::Path;

use crate::audio::{ms_to_frames, AudioData};
use crate::LoopState;

#[derive(Debug)]
pub enum ExportError {
    InvalidLoopCount,
    EmptyRegion,
    Wav(hound::Error),
    Io(std::io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExportError::InvalidLoopCount => write!(f, "loop count must be at least 1"),
            ExportError::EmptyRegion => write!(f, "loop region is empty"),
            ExportError::Wav(err) => write!(f, "failed to encode wav: {}", err),
            ExportError::Io(err) => write!(f, "failed to write file: {}", err),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Wav(err) => Some(err),
            ExportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<hound::Error> for ExportError {
    fn from(err: hound::Error) -> ExportError {
        ExportError::Wav(err)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> ExportError {
        ExportError::Io(err)
    }
}

/// Renders the A/B region `loops` times as a 32-bit float WAV.
pub fn render_loop(
    data: &AudioData,
    bounds: &LoopState,
    loops: u32,
) -> Result<Vec<u8>, ExportError> {
    if loops == 0 {
        return Err(ExportError::InvalidLoopCount);
    }

    let channels = data.channels as usize;
    let first = ms_to_frames(bounds.start_ms, data.sample_rate).min(data.frames());
    let last = ms_to_frames(bounds.end_ms, data.sample_rate).min(data.frames());
    if last <= first {
        return Err(ExportError::EmptyRegion);
    }
    let region = &data.samples[first * channels..last * channels];

    let spec = hound::WavSpec {
        channels: data.channels,
        sample_rate: data.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
    for _ in 0..loops {
        for &sample in region {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(buffer.into_inner())
}

pub fn export_loop<P: AsRef<Path>>(
    output_path: P,
    data: &AudioData,
    bounds: &LoopState,
    loops: u32,
) -> Result<(), ExportError> {
    let wav_data = render_loop(data, bounds, loops)?;
    std::fs::write(output_path, wav_data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sample_rate: u32, channels: u16, frames: usize) -> AudioData {
        AudioData {
            samples: (0..frames * channels as usize).map(|i| (i % 7) as f32 / 7.0).collect(),
            sample_rate,
            channels,
            title: None,
            artist: None,
            album: None,
            cover_art: None,
        }
    }

    #[test]
    fn repeats_region() {
        let data = tone(1_000, 2, 5_000);
        let bounds = LoopState::full(data.duration_ms()).clamped(1_000, 1_500);

        let wav = render_loop(&data, &bounds, 3).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 1_000);
        assert_eq!(reader.duration(), 500 * 3);

        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(&samples[..1_000], &data.samples[2_000..3_000]);
        assert_eq!(&samples[1_000..2_000], &data.samples[2_000..3_000]);
    }

    #[test]
    fn rejects_zero_loops_and_empty_region() {
        let data = tone(1_000, 1, 1_000);
        let whole = LoopState::full(data.duration_ms());
        assert!(matches!(render_loop(&data, &whole, 0), Err(ExportError::InvalidLoopCount)));

        let empty = whole.clamped(400, 400);
        assert!(matches!(render_loop(&data, &empty, 1), Err(ExportError::EmptyRegion)));
    }
}

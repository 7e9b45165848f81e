//! PCM → WAV snapshot encoding.
//!
//! Callers that want to persist or upload a capture (debugging, cloud
//! transcription fallbacks) get the raw buffer as a mono 16 kHz 16-bit WAV.

use std::io::Cursor;

use crate::audio::TARGET_SAMPLE_RATE;
use crate::error::{Result, VoiceformError};

/// Wrap raw capture samples in a WAV container.
///
/// Returns the complete file bytes; an empty input yields a header-only file.
pub fn pcm_to_wav(samples: &[i16]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| VoiceformError::Processing(format!("wav encode: {e}")))?;
        for sample in samples {
            writer
                .write_sample(*sample)
                .map_err(|e| VoiceformError::Processing(format!("wav encode: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| VoiceformError::Processing(format!("wav encode: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_riff_wave_header_and_expected_length() {
        let samples = vec![0i16, 1024, -1024, i16::MAX, i16::MIN];
        let bytes = pcm_to_wav(&samples).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte canonical header + 2 bytes per sample
        assert_eq!(bytes.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn round_trips_through_hound() {
        let samples: Vec<i16> = (0..160).map(|i| (i * 100) as i16).collect();
        let bytes = pcm_to_wav(&samples).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn empty_capture_yields_header_only_file() {
        let bytes = pcm_to_wav(&[]).unwrap();
        assert_eq!(bytes.len(), 44);
    }
}

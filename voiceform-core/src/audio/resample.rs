//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Capture devices run at their native rate (commonly 44.1/48 kHz); every
//! recognizer in this SDK consumes 16 kHz mono. `RateConverter` bridges the
//! gap on the capture-loop thread where allocation is fine. When the rates
//! already match no rubato session is created and input passes through.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{Result, VoiceformError};

/// Converts mono f32 audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough).
    resampler: Option<FastFixedIn<f32>>,
    /// Carry-over input that did not fill a whole rubato block yet.
    pending: Vec<f32>,
    /// Input frames rubato consumes per call.
    block: usize,
    /// Pre-allocated `[1][output_frames_max]` output buffer.
    out: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// `VoiceformError::AudioDevice` when rubato rejects the configuration.
    pub fn new(source_rate: u32, target_rate: u32, block: usize) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                block,
                out: Vec::new(),
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            target_rate as f64 / source_rate as f64,
            1.0,
            PolynomialDegree::Cubic,
            block,
            1,
        )
        .map_err(|e| VoiceformError::AudioDevice(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        tracing::debug!(source_rate, target_rate, block, max_out, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            block,
            out: vec![vec![0f32; max_out]],
        })
    }

    /// Feed samples in, get converted samples out (possibly empty while the
    /// internal block fills). Passthrough mode copies the input unchanged.
    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);

        let mut converted = Vec::new();
        while self.pending.len() >= self.block {
            let input = &self.pending[..self.block];
            match resampler.process_into_buffer(&[input], &mut self.out, None) {
                Ok((_, produced)) => converted.extend_from_slice(&self.out[0][..produced]),
                Err(e) => tracing::error!("resampler process error: {e}"),
            }
            self.pending.drain(..self.block);
        }
        converted
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

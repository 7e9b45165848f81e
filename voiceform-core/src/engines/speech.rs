//! Speech engine adapter: one capture/transcribe contract over whichever
//! strategy is configured.
//!
//! ## Capture threading
//!
//! `start_capture` spawns a dedicated blocking loop that owns the
//! [`SampleSource`](crate::audio::SampleSource) for its whole life (sources
//! may be `!Send`, e.g. a cpal stream). The loop is the only writer to the
//! capture buffer; `stop_capture` is the only reader; both go through one
//! `parking_lot::Mutex`. A sync oneshot channel propagates source-open errors
//! back to the `start_capture` caller, so a dead microphone fails loudly
//! instead of recording silence.

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::audio::{wav, SourceFactory, TARGET_SAMPLE_RATE};
use crate::engines::RecognizerHandle;
use crate::error::{Result, VoiceformError};

/// Upper bound per recognizer call: 30 s of 16 kHz audio. The underlying
/// inference contexts have a practical input-length ceiling; longer captures
/// are split at this boundary and processed sequentially.
pub const MAX_CHUNK_SAMPLES: usize = 30 * TARGET_SAMPLE_RATE as usize;

/// Samples pulled from the source per loop iteration (100 ms at 16 kHz).
const CAPTURE_FRAME: usize = 1_600;

/// Idle wait when the source has nothing buffered.
const EMPTY_SOURCE_SLEEP: Duration = Duration::from_millis(5);

/// Grace period for in-flight buffer writes after the stop signal.
const CAPTURE_SETTLE: Duration = Duration::from_millis(100);

/// Uniform capture + transcription front over the configured STT strategy.
///
/// All fields use interior mutability; wrap in `Arc` to share.
pub struct SpeechEngine {
    recognizer: RecognizerHandle,
    /// Set once `configure_recognizer` succeeds; transcription is rejected
    /// before that rather than silently returning nothing.
    recognizer_ready: AtomicBool,
    source_factory: SourceFactory,
    capturing: Arc<AtomicBool>,
    captured: Arc<Mutex<Vec<i16>>>,
}

impl SpeechEngine {
    pub fn new(recognizer: RecognizerHandle, source_factory: SourceFactory) -> Self {
        Self {
            recognizer,
            recognizer_ready: AtomicBool::new(false),
            source_factory,
            capturing: Arc::new(AtomicBool::new(false)),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Load the on-device recognizer artifacts.
    ///
    /// Only the on-device ASR strategy calls this; the native-platform and
    /// disabled strategies have no engine to load.
    pub fn configure_recognizer(&self, encoder: &Path, decoder: &Path, tokens: &Path) -> Result<()> {
        info!(?encoder, ?decoder, ?tokens, "loading speech recognizer");
        self.recognizer.0.lock().configure(encoder, decoder, tokens)?;
        self.recognizer_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Begin accumulating samples on a dedicated capture loop.
    ///
    /// Idempotent: calling while already capturing is a no-op. Blocks only
    /// until the source confirms it opened (or failed).
    pub fn start_capture(&self) -> Result<()> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            debug!("start_capture ignored — already capturing");
            return Ok(());
        }
        self.captured.lock().clear();

        let capturing = Arc::clone(&self.capturing);
        let captured = Arc::clone(&self.captured);
        let factory = Arc::clone(&self.source_factory);

        // Sync oneshot: the capture thread reports source open success/failure.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<()>>();

        tokio::task::spawn_blocking(move || {
            // The source must be created on THIS thread — it may be !Send.
            let mut source = match factory() {
                Ok(source) => {
                    let _ = open_tx.send(Ok(()));
                    source
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    capturing.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let mut frame = [0i16; CAPTURE_FRAME];
            while capturing.load(Ordering::Acquire) {
                match source.read(&mut frame) {
                    Ok(0) => std::thread::sleep(EMPTY_SOURCE_SLEEP),
                    Ok(n) => captured.lock().extend_from_slice(&frame[..n]),
                    Err(e) => {
                        error!("capture source error: {e}");
                        break;
                    }
                }
            }
            capturing.store(false, Ordering::Release);
            // Source drops here, releasing the device on this thread.
        });

        match open_rx.recv() {
            Ok(Ok(())) => {
                info!("capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.capturing.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                self.capturing.store(false, Ordering::SeqCst);
                Err(VoiceformError::AudioDevice(
                    "capture task died before opening a source".into(),
                ))
            }
        }
    }

    /// Stop the capture loop and return the normalized waveform.
    ///
    /// Waits briefly for in-flight writes to settle, then snapshots and clears
    /// the buffer atomically. Fixed-point samples are normalized to f32 in
    /// [-1.0, 1.0]. Empty when nothing was captured.
    pub async fn stop_capture(&self) -> Vec<f32> {
        let raw = self.stop_capture_raw().await;
        raw.iter().map(|s| f32::from(*s) / 32768.0).collect()
    }

    /// Stop the capture loop and return the raw buffer as WAV bytes.
    pub async fn stop_capture_wav(&self) -> Result<Vec<u8>> {
        let raw = self.stop_capture_raw().await;
        wav::pcm_to_wav(&raw)
    }

    async fn stop_capture_raw(&self) -> Vec<i16> {
        self.capturing.store(false, Ordering::SeqCst);
        tokio::time::sleep(CAPTURE_SETTLE).await;
        let raw = std::mem::take(&mut *self.captured.lock());
        debug!(samples = raw.len(), "capture stopped");
        raw
    }

    /// Transcribe a normalized waveform, chunked at [`MAX_CHUNK_SAMPLES`].
    ///
    /// Chunks run sequentially through the recognizer (parallel calls contend
    /// inside native contexts); non-blank partial results are joined with a
    /// single space. Empty input yields an empty transcript, not an error.
    pub fn transcribe(&self, samples: &[f32]) -> Result<String> {
        if !self.recognizer_ready.load(Ordering::Acquire) {
            return Err(VoiceformError::RecognizerNotConfigured);
        }
        if samples.is_empty() {
            return Ok(String::new());
        }

        let mut recognizer = self.recognizer.0.lock();
        let mut parts = Vec::new();
        for chunk in samples.chunks(MAX_CHUNK_SAMPLES) {
            let text = recognizer.transcribe(chunk)?;
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
        Ok(parts.join(" "))
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    pub(crate) fn captured_samples(&self) -> usize {
        self.captured.lock().len()
    }

    /// Stop any in-flight capture and free the recognizer context.
    ///
    /// Safe to call multiple times.
    pub fn release(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.recognizer.0.lock().release();
        self.recognizer_ready.store(false, Ordering::Release);
    }
}

//! Engine boundaries.
//!
//! The two inference backends are external collaborators consumed through
//! narrow traits: [`SpeechRecognizer`] (offline ASR over a float waveform) and
//! [`TextGenerator`] (local LLM text generation). `&mut self` expresses that
//! both are stateful native contexts; all mutation is serialised through the
//! `parking_lot::Mutex` inside the clone-able handles.
//!
//! Integrators bind their real backends (an ONNX recognizer, a mobile LLM
//! runtime) at client construction; [`stub`] provides development/test
//! implementations.

pub mod llm;
pub mod native;
pub mod speech;
pub mod stub;

pub use stub::{StubGenerator, StubRecognizer};

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Contract for offline speech-recognition backends.
pub trait SpeechRecognizer: Send + 'static {
    /// Load encoder/decoder/vocabulary artifacts into an inference context.
    ///
    /// # Errors
    /// Returns an error if any artifact is missing or corrupt. Failure is
    /// loud: the adapter never downgrades to another strategy.
    fn configure(&mut self, encoder: &Path, decoder: &Path, tokens: &Path) -> Result<()>;

    /// Transcribe normalized mono 16 kHz samples in [-1.0, 1.0].
    ///
    /// Callers bound the input length (see the speech adapter's chunking);
    /// implementations may assume one call's input fits their context window.
    fn transcribe(&mut self, samples: &[f32]) -> Result<String>;

    /// Free the inference context. Must be idempotent.
    fn release(&mut self);
}

/// Contract for local LLM backends.
pub trait TextGenerator: Send + 'static {
    /// Bind an inference context to a weights file on durable storage.
    fn configure(&mut self, weights: &Path, max_tokens: usize, top_k: usize) -> Result<()>;

    /// Run one single-shot generation. `Ok(None)` means no context is
    /// configured — an absent result, not a failure.
    fn generate(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Free the inference context. Must be idempotent.
    fn release(&mut self);
}

/// Thread-safe reference-counted handle to any [`SpeechRecognizer`].
#[derive(Clone)]
pub struct RecognizerHandle(pub Arc<Mutex<dyn SpeechRecognizer>>);

impl RecognizerHandle {
    pub fn new<R: SpeechRecognizer>(recognizer: R) -> Self {
        Self(Arc::new(Mutex::new(recognizer)))
    }
}

impl std::fmt::Debug for RecognizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerHandle").finish_non_exhaustive()
    }
}

/// Thread-safe reference-counted handle to any [`TextGenerator`].
#[derive(Clone)]
pub struct GeneratorHandle(pub Arc<Mutex<dyn TextGenerator>>);

impl GeneratorHandle {
    pub fn new<G: TextGenerator>(generator: G) -> Self {
        Self(Arc::new(Mutex::new(generator)))
    }
}

impl std::fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorHandle").finish_non_exhaustive()
    }
}

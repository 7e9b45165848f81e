//! Language-model engine adapter.
//!
//! Owns the lifecycle of one [`TextGenerator`] context: weight staging (a
//! legacy bundled asset is copied into durable storage on first use), context
//! replacement on re-setup and idempotent release. Generation itself is a
//! single-shot call; sampling parameters are bound when the context is
//! configured, not mutable per request.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::engines::GeneratorHandle;
use crate::error::Result;

/// Everything `setup` needs to bind a generation context.
#[derive(Debug, Clone)]
pub struct LlmSetup {
    /// Weights location on durable storage.
    pub model_path: PathBuf,
    /// Output token budget for every session.
    pub max_tokens: usize,
    /// Sampling top-K bound at context creation.
    pub top_k: usize,
    /// Optional bundled-asset fallback copied to `model_path` when the
    /// configured weights are missing.
    pub legacy_asset: Option<PathBuf>,
}

pub struct LlmEngine {
    generator: GeneratorHandle,
    configured: AtomicBool,
}

impl LlmEngine {
    pub fn new(generator: GeneratorHandle) -> Self {
        Self {
            generator,
            configured: AtomicBool::new(false),
        }
    }

    /// Create an inference context bound to the weights file.
    ///
    /// Replaces and releases any prior context. When `model_path` does not
    /// exist but `legacy_asset` does, the asset is copied into place first;
    /// the copy is skipped on every later setup because the destination then
    /// exists.
    pub fn setup(&self, setup: &LlmSetup) -> Result<()> {
        let weights = Self::stage_weights(setup)?;
        info!(weights = ?weights, max_tokens = setup.max_tokens, top_k = setup.top_k, "binding LLM context");

        let mut generator = self.generator.0.lock();
        generator.release();
        generator.configure(&weights, setup.max_tokens, setup.top_k)?;
        self.configured.store(true, Ordering::Release);
        Ok(())
    }

    fn stage_weights(setup: &LlmSetup) -> Result<PathBuf> {
        if setup.model_path.exists() {
            return Ok(setup.model_path.clone());
        }
        if let Some(asset) = setup.legacy_asset.as_deref().filter(|a| a.exists()) {
            if let Some(parent) = setup.model_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(asset, &setup.model_path)?;
            info!(from = ?asset, to = ?setup.model_path, "staged bundled LLM asset into durable storage");
        }
        // A still-missing file is the backend's error to report.
        Ok(setup.model_path.clone())
    }

    /// Run one single-shot generation.
    ///
    /// Returns `Ok(None)` when no context is configured rather than failing.
    /// May block for the whole generation; call from a blocking context.
    pub fn generate(&self, prompt: &str) -> Result<Option<String>> {
        if !self.configured.load(Ordering::Acquire) {
            debug!("generate skipped — no LLM context configured");
            return Ok(None);
        }
        self.generator.0.lock().generate(prompt)
    }

    /// Release the inference context. Safe to call multiple times.
    pub fn close(&self) {
        self.generator.0.lock().release();
        self.configured.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for LlmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmEngine")
            .field("configured", &self.configured.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

//! Stub engine backends.
//!
//! Placeholder implementations used before real bindings are wired in, and by
//! tests that need deterministic engine behavior. `StubRecognizer` replays a
//! fixed transcript; `StubGenerator` replays a fixed reply once configured.

use std::path::Path;

use tracing::debug;

use crate::engines::{SpeechRecognizer, TextGenerator};
use crate::error::Result;

/// Echo-style recognizer returning a canned transcript for any input.
pub struct StubRecognizer {
    transcript: String,
}

impl StubRecognizer {
    /// A recognizer that always reports silence (empty transcript).
    pub fn silent() -> Self {
        Self::with_transcript("")
    }

    pub fn with_transcript(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

impl Default for StubRecognizer {
    fn default() -> Self {
        Self::silent()
    }
}

impl SpeechRecognizer for StubRecognizer {
    fn configure(&mut self, encoder: &Path, decoder: &Path, tokens: &Path) -> Result<()> {
        debug!(?encoder, ?decoder, ?tokens, "StubRecognizer::configure — no-op");
        Ok(())
    }

    fn transcribe(&mut self, samples: &[f32]) -> Result<String> {
        if samples.is_empty() {
            return Ok(String::new());
        }
        Ok(self.transcript.clone())
    }

    fn release(&mut self) {
        debug!("StubRecognizer::release — no-op");
    }
}

/// Generator replaying one canned reply. Until `configure` is called it
/// reports an absent result, mirroring an unconfigured native context.
pub struct StubGenerator {
    reply: String,
    configured: bool,
}

impl StubGenerator {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            configured: false,
        }
    }
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::with_reply("{}")
    }
}

impl TextGenerator for StubGenerator {
    fn configure(&mut self, weights: &Path, max_tokens: usize, top_k: usize) -> Result<()> {
        debug!(?weights, max_tokens, top_k, "StubGenerator::configure");
        self.configured = true;
        Ok(())
    }

    fn generate(&mut self, _prompt: &str) -> Result<Option<String>> {
        if !self.configured {
            return Ok(None);
        }
        Ok(Some(self.reply.clone()))
    }

    fn release(&mut self) {
        self.configured = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stub_recognizer_replays_transcript_for_non_empty_audio() {
        let mut rec = StubRecognizer::with_transcript("hello there");
        assert_eq!(rec.transcribe(&[0.1, 0.2]).unwrap(), "hello there");
        assert_eq!(rec.transcribe(&[]).unwrap(), "");
    }

    #[test]
    fn stub_generator_is_absent_until_configured() {
        let mut generator = StubGenerator::with_reply("{\"a\":1}");
        assert_eq!(generator.generate("p").unwrap(), None);

        generator
            .configure(&PathBuf::from("weights.bin"), 512, 1)
            .unwrap();
        assert_eq!(generator.generate("p").unwrap().as_deref(), Some("{\"a\":1}"));

        generator.release();
        assert_eq!(generator.generate("p").unwrap(), None);
    }
}

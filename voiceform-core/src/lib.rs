//! # voiceform-core
//!
//! Speech-to-structured-JSON extraction SDK.
//!
//! ## Architecture
//!
//! ```text
//! ModelManager ──► ModelPaths ──► ClientBuilder ──► VoiceformClient
//!                                                        │ initialize()
//!                                   ┌────────────────────┴─────────────┐
//!                              SpeechEngine                        LlmEngine
//!                            (capture + ASR)                  (prompt → text)
//!                                   │  start_action / stop_action          │
//!                              transcript ──► generate_prompt ──► generate
//!                                                        │
//!                                                   sanitize ──► broadcast
//!                                                   ClientEvent::Extraction
//! ```
//!
//! The two inference backends and the platform recognizer are consumed
//! through narrow traits ([`SpeechRecognizer`], [`TextGenerator`],
//! [`engines::native::PlatformRecognizer`]); integrators bind their native
//! runtimes at build time. Whatever the model emits, the caller always
//! receives well-formed JSON — malformed output degrades to `{}`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod audio;
pub mod client;
pub mod engines;
pub mod error;
pub mod events;
pub mod prompt;
pub mod sanitize;

// Convenience re-exports for downstream crates
pub use acquisition::{ArtifactKind, ModelManager, ModelPaths, ModelSpec};
pub use client::{ClientBuilder, SessionState, SttProvider, VoiceformClient};
pub use engines::{GeneratorHandle, RecognizerHandle, SpeechRecognizer, TextGenerator};
pub use error::VoiceformError;
pub use events::{ClientEvent, DownloadProgress};
pub use prompt::{generate_prompt, Schema};
pub use sanitize::sanitize;

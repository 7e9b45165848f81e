//! `VoiceformClient` — the orchestration pipeline.
//!
//! ## Lifecycle
//!
//! ```text
//! VoiceformClient::builder() … .build()?
//!     └─► initialize()      → both engines brought up concurrently
//!         ├─ success        → Idle, Ready { success: true }
//!         └─ any failure    → InitFailed, Ready { success: false } + Error
//!     start_action()        → begin capture (or run the whole native flow)
//!     stop_action()         → capture → transcribe → prompt → generate
//!                             → sanitize → Extraction { json }
//!     release()             → engines freed, outstanding work cancelled
//! ```
//!
//! Every method is non-blocking from the caller's perspective: pipeline work
//! runs on Tokio workers and blocking threads, results arrive on the
//! broadcast channel returned by [`VoiceformClient::subscribe`]. Faults never
//! cross that boundary raw — each spawned unit of work maps its error into a
//! single [`ClientEvent::Error`].
//!
//! Methods must be called from within a Tokio runtime.

pub mod config;
pub mod state;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engines::llm::{LlmEngine, LlmSetup};
use crate::engines::native::{self, PlatformRecognizer};
use crate::engines::speech::SpeechEngine;
use crate::error::{Result, VoiceformError};
use crate::events::ClientEvent;
use crate::prompt::generate_prompt;
use crate::sanitize::sanitize;

pub use config::{ClientBuilder, ClientConfig, PermissionProbe, SttProvider};
pub use state::{SessionState, StateCell};

/// Broadcast capacity: buffered events for slow subscribers.
const EVENT_CAP: usize = 256;

/// Stateful session composing the speech adapter, the LLM adapter, the prompt
/// compiler and the sanitizer.
///
/// `Send + Sync` — all fields use interior mutability; wrap in `Arc` to share.
pub struct VoiceformClient {
    config: ClientConfig,
    speech: Arc<SpeechEngine>,
    llm: Arc<LlmEngine>,
    platform: Arc<Mutex<Box<dyn PlatformRecognizer>>>,
    permission: Arc<dyn PermissionProbe>,
    state: Arc<StateCell>,
    events_tx: broadcast::Sender<ClientEvent>,
    /// Outstanding pipeline tasks, aborted on release.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientBuilder {
    /// Validate the configuration and assemble a client.
    ///
    /// # Errors
    /// `VoiceformError::InvalidConfig` when required fields are missing —
    /// construction fails here rather than on first use.
    pub fn build(self) -> Result<VoiceformClient> {
        let config = self.validate()?;
        let recognizer = self.recognizer.unwrap_or_else(ClientBuilder::default_recognizer);
        let generator = self.generator.unwrap_or_else(ClientBuilder::default_generator);
        let platform: Box<dyn PlatformRecognizer> = self
            .platform_recognizer
            .unwrap_or_else(|| Box::new(native::UnavailableRecognizer));
        let source_factory = self
            .source_factory
            .unwrap_or_else(ClientBuilder::default_source_factory);
        let permission = self.permission.unwrap_or_else(ClientBuilder::default_permission);

        let (events_tx, _) = broadcast::channel(EVENT_CAP);
        Ok(VoiceformClient {
            speech: Arc::new(SpeechEngine::new(recognizer, source_factory)),
            llm: Arc::new(LlmEngine::new(generator)),
            platform: Arc::new(Mutex::new(platform)),
            permission,
            state: Arc::new(StateCell::new()),
            events_tx,
            tasks: Mutex::new(Vec::new()),
            config,
        })
    }
}

impl VoiceformClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events_tx.subscribe()
    }

    /// Current session state (snapshot).
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Bring both engines up concurrently.
    ///
    /// Exactly one `Ready` event is delivered per call. Both engines must
    /// succeed for the session to become ready; one ready engine with the
    /// other failed is an overall failure because every action needs both.
    /// When both fail, the `Error` event preserves both messages.
    pub fn initialize(&self) {
        let from_scratch = self
            .state
            .try_transition(SessionState::Uninitialized, SessionState::Initializing);
        let retrying = !from_scratch
            && self
                .state
                .try_transition(SessionState::InitFailed, SessionState::Initializing);
        if !from_scratch && !retrying {
            self.report_rejection("initialize");
            return;
        }

        let llm = Arc::clone(&self.llm);
        let speech = Arc::clone(&self.speech);
        let state = Arc::clone(&self.state);
        let events = self.events_tx.clone();
        let provider = self.config.stt_provider;
        let paths = self.config.model_paths.clone();
        let setup = LlmSetup {
            model_path: self.config.model_paths.llm_weights.clone(),
            max_tokens: self.config.max_tokens,
            top_k: self.config.top_k,
            legacy_asset: self.config.legacy_llm_asset.clone(),
        };

        let handle = tokio::spawn(async move {
            let llm_unit = tokio::task::spawn_blocking(move || llm.setup(&setup));
            let speech_unit = tokio::task::spawn_blocking(move || match provider {
                SttProvider::OnDeviceAsr => speech.configure_recognizer(
                    &paths.stt_encoder,
                    &paths.stt_decoder,
                    &paths.stt_tokens,
                ),
                SttProvider::NativePlatform | SttProvider::Disabled => Ok(()),
            });
            let (llm_outcome, speech_outcome) = tokio::join!(llm_unit, speech_unit);

            let mut failures = Vec::new();
            match llm_outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!("llm: {e}")),
                Err(e) => failures.push(format!("llm: {e}")),
            }
            match speech_outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!("speech: {e}")),
                Err(e) => failures.push(format!("speech: {e}")),
            }

            if failures.is_empty() {
                if state.try_transition(SessionState::Initializing, SessionState::Idle) {
                    info!("pipeline ready");
                    let _ = events.send(ClientEvent::Ready { success: true });
                }
                // A lost transition means release() won the race; stay silent.
            } else {
                let message = VoiceformError::EngineInit(failures.join("; ")).to_string();
                warn!(%message, "engine bring-up failed");
                if state.try_transition(SessionState::Initializing, SessionState::InitFailed) {
                    let _ = events.send(ClientEvent::Ready { success: false });
                    let _ = events.send(ClientEvent::Error { message });
                }
            }
        });
        self.track(handle);
    }

    /// Start an action request.
    ///
    /// For the native-platform provider this runs the full recognize-and-
    /// process pipeline (capture and transcription are bundled in that
    /// strategy); for capture-based providers it only begins capture —
    /// processing happens on [`stop_action`](Self::stop_action).
    pub fn start_action(&self) {
        match self.config.stt_provider {
            SttProvider::NativePlatform => {
                if !self
                    .state
                    .try_transition(SessionState::Idle, SessionState::Processing)
                {
                    self.report_rejection("start_action");
                    return;
                }

                let platform = Arc::clone(&self.platform);
                let llm = Arc::clone(&self.llm);
                let config = self.config.clone();
                let state = Arc::clone(&self.state);
                let events = self.events_tx.clone();
                let handle = tokio::spawn(async move {
                    let transcript = native::recognize(&platform, config.native_timeout).await;
                    let outcome = finish_extraction(llm, &config, transcript).await;
                    deliver(&events, outcome);
                    state.try_transition(SessionState::Processing, SessionState::Idle);
                });
                self.track(handle);
            }

            SttProvider::OnDeviceAsr | SttProvider::Disabled => {
                if self.state.current() != SessionState::Idle {
                    self.report_rejection("start_action");
                    return;
                }
                if !self.permission.capture_granted() {
                    self.report_error(&VoiceformError::PermissionDenied);
                    return;
                }
                if !self
                    .state
                    .try_transition(SessionState::Idle, SessionState::Capturing)
                {
                    self.report_rejection("start_action");
                    return;
                }
                if let Err(e) = self.speech.start_capture() {
                    self.state
                        .try_transition(SessionState::Capturing, SessionState::Idle);
                    self.report_error(&e);
                }
            }
        }
    }

    /// Stop capture and process the request.
    ///
    /// No-op for the native-platform provider — its capture already completed
    /// inside [`start_action`](Self::start_action). Stages run strictly in
    /// order: stop-capture → transcribe → prompt → generate → sanitize.
    pub fn stop_action(&self) {
        if self.config.stt_provider == SttProvider::NativePlatform {
            debug!("stop_action is a no-op for the native-platform provider");
            return;
        }
        if !self
            .state
            .try_transition(SessionState::Capturing, SessionState::Processing)
        {
            self.report_rejection("stop_action");
            return;
        }

        let speech = Arc::clone(&self.speech);
        let llm = Arc::clone(&self.llm);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = run_capture_pipeline(speech, llm, &config).await;
            deliver(&events, outcome);
            state.try_transition(SessionState::Processing, SessionState::Idle);
        });
        self.track(handle);
    }

    /// Release both engines and cancel outstanding work.
    ///
    /// Terminal and idempotent: after the first call every other operation
    /// reports an error. In-flight tasks observe cancellation at their next
    /// suspension point; native inference mid-call is not interrupted.
    pub fn release(&self) {
        let prior = self.state.force(SessionState::Released);
        if prior == SessionState::Released {
            debug!("release ignored — already released");
            return;
        }
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        self.speech.release();
        self.llm.close();
        self.platform.lock().cancel();
        info!("client released");
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    fn report_error(&self, error: &VoiceformError) {
        warn!(%error, "pipeline error");
        let _ = self.events_tx.send(ClientEvent::Error {
            message: error.to_string(),
        });
    }

    fn report_rejection(&self, operation: &str) {
        let error = if self.state.current() == SessionState::Released {
            VoiceformError::Released
        } else {
            VoiceformError::NotReady
        };
        debug!(operation, state = ?self.state.current(), "operation rejected");
        self.report_error(&error);
    }
}

fn deliver(events: &broadcast::Sender<ClientEvent>, outcome: Result<String>) {
    match outcome {
        Ok(json) => {
            let _ = events.send(ClientEvent::Extraction { json });
        }
        Err(e) => {
            warn!(error = %e, "action failed");
            let _ = events.send(ClientEvent::Error {
                message: e.to_string(),
            });
        }
    }
}

/// stop-capture → transcribe, then the shared extraction tail.
async fn run_capture_pipeline(
    speech: Arc<SpeechEngine>,
    llm: Arc<LlmEngine>,
    config: &ClientConfig,
) -> Result<String> {
    let samples = speech.stop_capture().await;
    let transcript = tokio::task::spawn_blocking(move || speech.transcribe(&samples))
        .await
        .map_err(|e| VoiceformError::Processing(format!("transcription task failed: {e}")))??;
    finish_extraction(llm, config, transcript).await
}

/// Blank-check → prompt → generate → sanitize.
///
/// An absent generation (no LLM context) degrades to `{}` — the sanitizer
/// guarantees the caller still receives valid JSON.
async fn finish_extraction(
    llm: Arc<LlmEngine>,
    config: &ClientConfig,
    transcript: String,
) -> Result<String> {
    let transcript = transcript.trim().to_string();
    if transcript.is_empty() {
        return Err(VoiceformError::NoSpeechDetected);
    }
    debug!(chars = transcript.len(), "transcript ready");

    let prompt = generate_prompt(&transcript, &config.schema, config.system_instruction.as_deref());
    let raw = tokio::task::spawn_blocking(move || llm.generate(&prompt))
        .await
        .map_err(|e| VoiceformError::Processing(format!("generation task failed: {e}")))??;

    Ok(sanitize(raw.as_deref().unwrap_or("{}")))
}

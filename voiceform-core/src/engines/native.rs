//! Platform speech recognizer bridged into a single awaitable operation.
//!
//! Platform recognizers speak a callback protocol (ready / begin / partial /
//! error / final). [`recognize`] drives that protocol as an explicit state
//! machine over an event channel and resolves exactly once: to the first
//! final transcript, or to an empty string on error, timeout, unavailability
//! or a vanished recognizer. The recognizer is cancelled on every exit path.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;

/// One callback from the platform recognizer, as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// Recognizer is ready for speech.
    Ready,
    /// User started speaking.
    SpeechBegin,
    /// Interim hypothesis; may change.
    Partial(String),
    /// User stopped speaking; a final result should follow.
    SpeechEnd,
    /// Recognition failed. Carries the platform error description.
    Error(String),
    /// The committed transcript for this session.
    Final(String),
}

/// Boundary to the platform's built-in recognizer.
///
/// `start_listening` begins one recognition session and reports its callbacks
/// on `events`; implementations may send from any thread (`try_send` or
/// `blocking_send`). `cancel` must be safe to call at any time, including
/// after the session already ended.
pub trait PlatformRecognizer: Send + 'static {
    fn available(&self) -> bool;

    fn start_listening(&mut self, events: mpsc::Sender<RecognizerEvent>) -> Result<()>;

    fn cancel(&mut self);
}

/// Session phases. Only `Listening` consumes events; both terminal phases
/// carry the resolved transcript.
#[derive(Debug, PartialEq, Eq)]
enum Phase {
    Listening,
    Resolved(String),
    Failed,
}

impl Phase {
    fn advance(self, event: RecognizerEvent) -> Phase {
        match (self, event) {
            (Phase::Listening, RecognizerEvent::Final(text)) => Phase::Resolved(text),
            (Phase::Listening, RecognizerEvent::Error(reason)) => {
                warn!(%reason, "platform recognizer error");
                Phase::Failed
            }
            (Phase::Listening, event) => {
                debug!(?event, "recognizer event");
                Phase::Listening
            }
            (done, _) => done,
        }
    }
}

/// Run one recognition session to completion.
///
/// Resolves to the first final transcript, or `""` when the recognizer is
/// unavailable, fails to start, reports an error, closes its channel without
/// a final, or exceeds `timeout`.
pub async fn recognize(
    recognizer: &Mutex<Box<dyn PlatformRecognizer>>,
    timeout: Duration,
) -> String {
    let (tx, mut rx) = mpsc::channel::<RecognizerEvent>(16);

    {
        let mut rec = recognizer.lock();
        if !rec.available() {
            warn!("platform recognizer unavailable");
            return String::new();
        }
        if let Err(e) = rec.start_listening(tx) {
            warn!("platform recognizer failed to start: {e}");
            rec.cancel();
            return String::new();
        }
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut phase = Phase::Listening;

    let transcript = loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Err(_) => {
                warn!("platform recognition timed out");
                break String::new();
            }
            Ok(None) => {
                debug!("recognizer channel closed without a final transcript");
                break String::new();
            }
            Ok(Some(event)) => {
                phase = phase.advance(event);
                match phase {
                    Phase::Resolved(ref text) => break text.clone(),
                    Phase::Failed => break String::new(),
                    Phase::Listening => {}
                }
            }
        }
    };

    // Always release the platform resource, whatever the outcome.
    recognizer.lock().cancel();
    transcript
}

/// Default backend for hosts without a platform recognizer.
pub struct UnavailableRecognizer;

impl PlatformRecognizer for UnavailableRecognizer {
    fn available(&self) -> bool {
        false
    }

    fn start_listening(&mut self, _events: mpsc::Sender<RecognizerEvent>) -> Result<()> {
        Ok(())
    }

    fn cancel(&mut self) {}
}

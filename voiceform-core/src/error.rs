use thiserror::Error;

/// All errors produced by voiceform-core.
#[derive(Debug, Error)]
pub enum VoiceformError {
    #[error("engine initialization failed: {0}")]
    EngineInit(String),

    #[error("pipeline is not ready")]
    NotReady,

    #[error("session has been released")]
    Released,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no speech detected")]
    NoSpeechDetected,

    #[error("speech recognizer is not configured")]
    RecognizerNotConfigured,

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("download failed for {file_name}: {message}")]
    Download { file_name: String, message: String },

    #[error("artifact registry has no entry for {0}")]
    MissingArtifact(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoiceformError>;

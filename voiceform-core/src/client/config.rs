//! Client configuration.
//!
//! An immutable [`ClientConfig`] record built through consuming `with_*`
//! transformations on [`ClientBuilder`]; validation happens once in
//! [`ClientBuilder::build`], which fails construction instead of deferring
//! errors to first use.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::acquisition::ModelPaths;
use crate::audio::SourceFactory;
use crate::engines::native::PlatformRecognizer;
use crate::engines::stub::{StubGenerator, StubRecognizer};
use crate::engines::{GeneratorHandle, RecognizerHandle, SpeechRecognizer, TextGenerator};
use crate::error::{Result, VoiceformError};
use crate::prompt::Schema;

/// Mutually exclusive speech-to-text strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProvider {
    /// Offline streaming ASR over downloaded encoder/decoder/tokens artifacts.
    OnDeviceAsr,
    /// The platform's built-in recognizer (capture bundled into the request).
    NativePlatform,
    /// No transcription engine; action requests will report errors.
    Disabled,
}

/// Reports whether the process currently holds microphone permission.
///
/// Platform glue implements this over the host permission system; the default
/// always grants, which is correct on hosts without a permission model.
pub trait PermissionProbe: Send + Sync {
    fn capture_granted(&self) -> bool;
}

struct AlwaysGranted;

impl PermissionProbe for AlwaysGranted {
    fn capture_granted(&self) -> bool {
        true
    }
}

/// Validated, immutable configuration of one client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub model_paths: ModelPaths,
    pub schema: Schema,
    pub max_tokens: usize,
    pub top_k: usize,
    pub system_instruction: Option<String>,
    pub stt_provider: SttProvider,
    /// Bundled-asset fallback for the LLM weights (copied on first setup).
    pub legacy_llm_asset: Option<PathBuf>,
    /// Upper bound on one native-platform recognition session.
    pub native_timeout: Duration,
}

/// Accumulates configuration and boundary implementations for
/// [`VoiceformClient`](crate::client::VoiceformClient).
pub struct ClientBuilder {
    model_paths: Option<ModelPaths>,
    schema: Schema,
    max_tokens: usize,
    top_k: usize,
    system_instruction: Option<String>,
    stt_provider: SttProvider,
    legacy_llm_asset: Option<PathBuf>,
    native_timeout: Duration,
    pub(crate) recognizer: Option<RecognizerHandle>,
    pub(crate) generator: Option<GeneratorHandle>,
    pub(crate) platform_recognizer: Option<Box<dyn PlatformRecognizer>>,
    pub(crate) source_factory: Option<SourceFactory>,
    pub(crate) permission: Option<Arc<dyn PermissionProbe>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            model_paths: None,
            schema: Schema::new(),
            max_tokens: 512,
            top_k: 1,
            system_instruction: None,
            stt_provider: SttProvider::NativePlatform,
            legacy_llm_asset: None,
            native_timeout: Duration::from_secs(30),
            recognizer: None,
            generator: None,
            platform_recognizer: None,
            source_factory: None,
            permission: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Required: the artifact bundle produced by the acquisition manager (or
    /// assembled by the caller).
    pub fn with_model_paths(mut self, paths: ModelPaths) -> Self {
        self.model_paths = Some(paths);
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_stt_provider(mut self, provider: SttProvider) -> Self {
        self.stt_provider = provider;
        self
    }

    pub fn with_legacy_llm_asset(mut self, asset: impl Into<PathBuf>) -> Self {
        self.legacy_llm_asset = Some(asset.into());
        self
    }

    pub fn with_native_timeout(mut self, timeout: Duration) -> Self {
        self.native_timeout = timeout;
        self
    }

    /// Bind the offline ASR backend (defaults to a silent stub).
    pub fn with_recognizer<R: SpeechRecognizer>(mut self, recognizer: R) -> Self {
        self.recognizer = Some(RecognizerHandle::new(recognizer));
        self
    }

    /// Bind the LLM backend (defaults to a stub replying `{}`).
    pub fn with_generator<G: TextGenerator>(mut self, generator: G) -> Self {
        self.generator = Some(GeneratorHandle::new(generator));
        self
    }

    /// Bind the platform recognizer (defaults to "unavailable").
    pub fn with_platform_recognizer<P: PlatformRecognizer>(mut self, recognizer: P) -> Self {
        self.platform_recognizer = Some(Box::new(recognizer));
        self
    }

    /// Bind the capture source (defaults to the microphone when the
    /// `audio-cpal` feature is on).
    pub fn with_source_factory(mut self, factory: SourceFactory) -> Self {
        self.source_factory = Some(factory);
        self
    }

    pub fn with_permission_probe(mut self, probe: Arc<dyn PermissionProbe>) -> Self {
        self.permission = Some(probe);
        self
    }

    pub(crate) fn validate(&self) -> Result<ClientConfig> {
        let Some(paths) = self.model_paths.clone() else {
            return Err(VoiceformError::InvalidConfig("model paths are required".into()));
        };
        if paths.llm_weights.as_os_str().is_empty() {
            return Err(VoiceformError::InvalidConfig(
                "LLM weights path must not be empty".into(),
            ));
        }
        if self.stt_provider == SttProvider::OnDeviceAsr {
            for (label, path) in [
                ("STT encoder", &paths.stt_encoder),
                ("STT decoder", &paths.stt_decoder),
                ("STT tokens", &paths.stt_tokens),
            ] {
                if path.as_os_str().is_empty() {
                    return Err(VoiceformError::InvalidConfig(format!(
                        "{label} path must not be empty for the on-device ASR provider"
                    )));
                }
            }
        }

        Ok(ClientConfig {
            model_paths: paths,
            schema: self.schema.clone(),
            max_tokens: self.max_tokens,
            top_k: self.top_k,
            system_instruction: self.system_instruction.clone(),
            stt_provider: self.stt_provider,
            legacy_llm_asset: self.legacy_llm_asset.clone(),
            native_timeout: self.native_timeout,
        })
    }

    pub(crate) fn default_recognizer() -> RecognizerHandle {
        RecognizerHandle::new(StubRecognizer::silent())
    }

    pub(crate) fn default_generator() -> GeneratorHandle {
        GeneratorHandle::new(StubGenerator::default())
    }

    pub(crate) fn default_permission() -> Arc<dyn PermissionProbe> {
        Arc::new(AlwaysGranted)
    }

    #[cfg(feature = "audio-cpal")]
    pub(crate) fn default_source_factory() -> SourceFactory {
        Arc::new(|| {
            crate::audio::MicSource::open_default()
                .map(|source| Box::new(source) as Box<dyn crate::audio::SampleSource>)
        })
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub(crate) fn default_source_factory() -> SourceFactory {
        Arc::new(|| {
            Err(VoiceformError::AudioDevice(
                "compiled without the audio-cpal feature".into(),
            ))
        })
    }
}

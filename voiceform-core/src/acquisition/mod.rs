//! Model artifact acquisition.
//!
//! Resolves local paths for every artifact the pipeline needs, downloading
//! missing ones from remote storage. The queue is strictly sequential —
//! parallel transfers fight over bandwidth and flash I/O on the devices this
//! SDK targets — and fail-fast: the first failure aborts everything left, so
//! a partial path set never reaches the client.
//!
//! "File exists with non-zero length" is the only already-downloaded signal;
//! there is no checksum/size verification against the remote artifact. A
//! truncated file from a previous crash therefore passes the check.
//! Integrators that need integrity guarantees must verify on top of this
//! layer before trusting the returned paths.

pub mod transport;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Result, VoiceformError};
use crate::events::DownloadProgress;

use self::transport::{DownloadTransport, HttpTransport};

/// Host that gets the bearer token attached.
const MODEL_HOST: &str = "huggingface.co";

/// Streaming copy buffer.
const COPY_BUF: usize = 8 * 1024;

/// Broadcast capacity for progress events.
const PROGRESS_CAP: usize = 256;

/// What an artifact is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    SttEncoder,
    SttDecoder,
    SttTokens,
    LlmWeights,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::SttEncoder => "STT encoder",
            ArtifactKind::SttDecoder => "STT decoder",
            ArtifactKind::SttTokens => "STT tokens",
            ArtifactKind::LlmWeights => "LLM weights",
        }
    }
}

/// Static descriptor of one downloadable artifact.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub file_name: String,
    pub url: String,
    pub kind: ArtifactKind,
}

impl ModelSpec {
    pub fn new(file_name: &str, url: &str, kind: ArtifactKind) -> Self {
        Self {
            file_name: file_name.to_string(),
            url: url.to_string(),
            kind,
        }
    }
}

/// The default artifact registry: whisper-tiny int8 ONNX ASR plus a Gemma 3
/// 1B instruction-tuned LLM.
pub fn default_model_specs() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new(
            "tiny-encoder.int8.onnx",
            "https://huggingface.co/csukuangfj/sherpa-onnx-whisper-tiny/resolve/main/tiny-encoder.int8.onnx",
            ArtifactKind::SttEncoder,
        ),
        ModelSpec::new(
            "tiny-decoder.int8.onnx",
            "https://huggingface.co/csukuangfj/sherpa-onnx-whisper-tiny/resolve/main/tiny-decoder.int8.onnx",
            ArtifactKind::SttDecoder,
        ),
        ModelSpec::new(
            "tiny-tokens.txt",
            "https://huggingface.co/csukuangfj/sherpa-onnx-whisper-tiny/resolve/main/tiny-tokens.txt",
            ArtifactKind::SttTokens,
        ),
        ModelSpec::new(
            "gemma3-1b-it-int4.task",
            "https://huggingface.co/litert-community/Gemma3-1B-IT/resolve/main/gemma3-1b-it-int4.task?download=true",
            ArtifactKind::LlmWeights,
        ),
    ]
}

/// A known LLM weights release callers can swap into the registry.
#[derive(Debug, Clone, Copy)]
pub struct LlmRelease {
    pub file_name: &'static str,
    pub url: &'static str,
    /// Whether the model ingests audio directly instead of a transcript.
    pub audio_native: bool,
}

/// Catalog of LLM releases this SDK has been exercised against.
pub fn llm_release_catalog() -> Vec<LlmRelease> {
    vec![
        LlmRelease {
            file_name: "gemma3-1b-it-int4.task",
            url: "https://huggingface.co/litert-community/Gemma3-1B-IT/resolve/main/gemma3-1b-it-int4.task?download=true",
            audio_native: false,
        },
        LlmRelease {
            file_name: "gemma3-270m-it-q8.litertlm",
            url: "https://huggingface.co/litert-community/gemma-3-270m-it/resolve/main/gemma3-270m-it-q8.litertlm?download=true",
            audio_native: false,
        },
        LlmRelease {
            file_name: "gemma-3n-E2B-it-int4-Web.litertlm",
            url: "https://huggingface.co/google/gemma-3n-E2B-it-litert-lm/resolve/main/gemma-3n-E2B-it-int4-Web.litertlm?download=true",
            audio_native: false,
        },
    ]
}

/// Resolved local locations of every required artifact.
///
/// Immutable once produced; the acquisition run either fills all four entries
/// or fails — no partial sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub stt_encoder: PathBuf,
    pub stt_decoder: PathBuf,
    pub stt_tokens: PathBuf,
    pub llm_weights: PathBuf,
}

impl ModelPaths {
    fn assemble(mut resolved: HashMap<ArtifactKind, PathBuf>) -> Result<Self> {
        let mut take = |kind: ArtifactKind| {
            resolved
                .remove(&kind)
                .ok_or_else(|| VoiceformError::MissingArtifact(kind.label().to_string()))
        };
        Ok(Self {
            stt_encoder: take(ArtifactKind::SttEncoder)?,
            stt_decoder: take(ArtifactKind::SttDecoder)?,
            stt_tokens: take(ArtifactKind::SttTokens)?,
            llm_weights: take(ArtifactKind::LlmWeights)?,
        })
    }
}

/// Default durable storage location for model artifacts.
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(|p| PathBuf::from(p).join("voiceform").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
            })
            .map(|base| base.join("voiceform").join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }
}

/// Sequential, fail-fast artifact downloader.
pub struct ModelManager {
    data_dir: PathBuf,
    hf_token: Option<String>,
    specs: Vec<ModelSpec>,
    transport: Option<Arc<dyn DownloadTransport>>,
    progress_tx: broadcast::Sender<DownloadProgress>,
}

impl ModelManager {
    pub fn new(data_dir: impl Into<PathBuf>, hf_token: Option<String>) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAP);
        Self {
            data_dir: data_dir.into(),
            hf_token,
            specs: default_model_specs(),
            transport: None,
            progress_tx,
        }
    }

    /// Replace the default registry.
    pub fn with_specs(mut self, specs: Vec<ModelSpec>) -> Self {
        self.specs = specs;
        self
    }

    /// Replace the HTTP transport (tests, proxies, custom stacks).
    pub fn with_transport(mut self, transport: Arc<dyn DownloadTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Subscribe to per-file progress events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<DownloadProgress> {
        self.progress_tx.subscribe()
    }

    /// Ensure every registry artifact exists locally, downloading what is
    /// missing. Returns the complete path bundle, or the first failure.
    ///
    /// Already-present files (non-empty) short-circuit with an immediate
    /// 100 % progress event and no network request. No internal retries —
    /// re-invoke to retry.
    pub async fn check_and_download(&self) -> Result<ModelPaths> {
        let data_dir = self.data_dir.clone();
        let token = self.hf_token.clone();
        let specs = self.specs.clone();
        let transport = self.transport.clone();
        let progress = self.progress_tx.clone();

        tokio::task::spawn_blocking(move || {
            // The default transport is built lazily on the blocking thread —
            // a blocking HTTP client must not live on the async executor.
            let transport: Arc<dyn DownloadTransport> = match transport {
                Some(t) => t,
                None => Arc::new(HttpTransport::new()?),
            };
            run_queue(&data_dir, token.as_deref(), &specs, transport.as_ref(), &progress)
        })
        .await
        .map_err(|e| VoiceformError::Processing(format!("download task failed: {e}")))?
    }
}

fn run_queue(
    data_dir: &Path,
    token: Option<&str>,
    specs: &[ModelSpec],
    transport: &dyn DownloadTransport,
    progress: &broadcast::Sender<DownloadProgress>,
) -> Result<ModelPaths> {
    std::fs::create_dir_all(data_dir)?;
    let mut resolved: HashMap<ArtifactKind, PathBuf> = HashMap::new();

    for spec in specs {
        let path = data_dir.join(&spec.file_name);

        let present = path
            .metadata()
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);
        if present {
            debug!(file = %spec.file_name, "artifact already present");
            let _ = progress.send(DownloadProgress {
                file_name: spec.file_name.clone(),
                percent: 100,
            });
            resolved.insert(spec.kind, path);
            continue;
        }

        // A zero-length or otherwise stale leftover is a failed earlier run.
        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        info!(file = %spec.file_name, url = %spec.url, "downloading artifact");
        download_artifact(transport, token, spec, &path, progress)?;
        resolved.insert(spec.kind, path);
    }

    ModelPaths::assemble(resolved)
}

fn download_artifact(
    transport: &dyn DownloadTransport,
    token: Option<&str>,
    spec: &ModelSpec,
    path: &Path,
    progress: &broadcast::Sender<DownloadProgress>,
) -> Result<()> {
    let bearer = if spec.url.contains(MODEL_HOST) {
        if token.is_none() {
            warn!(file = %spec.file_name, "downloading from {MODEL_HOST} without a bearer token");
        }
        token
    } else {
        None
    };

    let response = transport.fetch(&spec.url, bearer)?;
    if !response.is_success() {
        return Err(VoiceformError::Download {
            file_name: spec.file_name.clone(),
            message: format!("http status {}", response.status),
        });
    }

    let total = response.content_length.filter(|t| *t > 0);
    let mut body = response.body;
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    let mut buf = [0u8; COPY_BUF];
    let mut copied: u64 = 0;
    let mut last_percent: u8 = 0;

    loop {
        let n = body.read(&mut buf).map_err(|e| VoiceformError::Download {
            file_name: spec.file_name.clone(),
            message: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        copied += n as u64;

        if let Some(total) = total {
            let percent = ((copied * 100) / total).min(100) as u8;
            if percent > last_percent {
                last_percent = percent;
                let _ = progress.send(DownloadProgress {
                    file_name: spec.file_name.clone(),
                    percent,
                });
            }
        }
    }
    out.flush()?;

    info!(file = %spec.file_name, bytes = copied, "download complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;
    use std::sync::Mutex;

    use super::transport::TransportResponse;

    enum Outcome {
        Body(Vec<u8>),
        Status(u16),
        NetworkError,
    }

    struct ScriptedTransport {
        outcomes: HashMap<String, Outcome>,
        requests: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<(&str, Outcome)>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(url, o)| (url.to_string(), o))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requested_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    /// Yields one byte per `read` call so percent callbacks get exercised.
    struct TricklingReader {
        bytes: Cursor<Vec<u8>>,
    }

    impl Read for TricklingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut one = [0u8; 1];
            let n = self.bytes.read(&mut one)?;
            if n == 1 {
                buf[0] = one[0];
            }
            Ok(n)
        }
    }

    impl DownloadTransport for ScriptedTransport {
        fn fetch(&self, url: &str, bearer: Option<&str>) -> crate::error::Result<TransportResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), bearer.map(str::to_string)));
            match self.outcomes.get(url) {
                Some(Outcome::Body(bytes)) => Ok(TransportResponse {
                    status: 200,
                    content_length: Some(bytes.len() as u64),
                    body: Box::new(TricklingReader {
                        bytes: Cursor::new(bytes.clone()),
                    }),
                }),
                Some(Outcome::Status(status)) => Ok(TransportResponse {
                    status: *status,
                    content_length: None,
                    body: Box::new(std::io::empty()),
                }),
                Some(Outcome::NetworkError) => Err(VoiceformError::Download {
                    file_name: url.to_string(),
                    message: "connection reset".into(),
                }),
                None => panic!("unscripted url {url}"),
            }
        }
    }

    fn specs() -> Vec<ModelSpec> {
        vec![
            ModelSpec::new("encoder.onnx", "https://huggingface.co/m/encoder.onnx", ArtifactKind::SttEncoder),
            ModelSpec::new("decoder.onnx", "https://huggingface.co/m/decoder.onnx", ArtifactKind::SttDecoder),
            ModelSpec::new("tokens.txt", "https://huggingface.co/m/tokens.txt", ArtifactKind::SttTokens),
            ModelSpec::new("weights.task", "https://huggingface.co/m/weights.task", ArtifactKind::LlmWeights),
        ]
    }

    fn drain(rx: &mut broadcast::Receiver<DownloadProgress>) -> Vec<DownloadProgress> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn downloads_all_artifacts_and_returns_full_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let all = specs();
        let transport = ScriptedTransport::new(
            all.iter()
                .map(|s| (s.url.as_str(), Outcome::Body(b"data".to_vec())))
                .collect(),
        );
        let manager = ModelManager::new(dir.path(), Some("tok".into()))
            .with_specs(all)
            .with_transport(transport.clone());

        let paths = manager.check_and_download().await.unwrap();
        assert_eq!(paths.stt_encoder, dir.path().join("encoder.onnx"));
        assert_eq!(paths.llm_weights, dir.path().join("weights.task"));
        assert_eq!(std::fs::read(&paths.stt_tokens).unwrap(), b"data");
        assert_eq!(transport.requested_urls().len(), 4);
    }

    #[tokio::test]
    async fn second_artifact_failure_aborts_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let all = specs();
        let transport = ScriptedTransport::new(vec![
            (all[0].url.as_str(), Outcome::Body(b"ok".to_vec())),
            (all[1].url.as_str(), Outcome::Status(500)),
            (all[2].url.as_str(), Outcome::Body(b"never".to_vec())),
            (all[3].url.as_str(), Outcome::Body(b"never".to_vec())),
        ]);
        let manager = ModelManager::new(dir.path(), Some("tok".into()))
            .with_specs(all.clone())
            .with_transport(transport.clone());

        let err = manager.check_and_download().await.unwrap_err();
        assert!(matches!(err, VoiceformError::Download { .. }));
        // Artifacts #3 and #4 were never attempted.
        assert_eq!(
            transport.requested_urls(),
            vec![all[0].url.clone(), all[1].url.clone()]
        );
    }

    #[tokio::test]
    async fn network_error_also_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let all = specs();
        let transport = ScriptedTransport::new(vec![
            (all[0].url.as_str(), Outcome::NetworkError),
            (all[1].url.as_str(), Outcome::Body(b"never".to_vec())),
            (all[2].url.as_str(), Outcome::Body(b"never".to_vec())),
            (all[3].url.as_str(), Outcome::Body(b"never".to_vec())),
        ]);
        let manager = ModelManager::new(dir.path(), None)
            .with_specs(all.clone())
            .with_transport(transport.clone());

        assert!(manager.check_and_download().await.is_err());
        assert_eq!(transport.requested_urls(), vec![all[0].url.clone()]);
    }

    #[tokio::test]
    async fn present_non_empty_files_short_circuit_without_requests() {
        let dir = tempfile::tempdir().unwrap();
        for spec in specs() {
            std::fs::write(dir.path().join(&spec.file_name), b"cached").unwrap();
        }
        let transport = ScriptedTransport::new(vec![]);
        let manager = ModelManager::new(dir.path(), None)
            .with_specs(specs())
            .with_transport(transport.clone());
        let mut progress = manager.subscribe_progress();

        let paths = manager.check_and_download().await.unwrap();
        assert!(transport.requested_urls().is_empty());
        assert_eq!(std::fs::read(&paths.llm_weights).unwrap(), b"cached");

        let events = drain(&mut progress);
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.percent == 100));
    }

    #[tokio::test]
    async fn stale_zero_length_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let all = specs();
        std::fs::write(dir.path().join(&all[0].file_name), b"").unwrap();
        let transport = ScriptedTransport::new(
            all.iter()
                .map(|s| (s.url.as_str(), Outcome::Body(b"fresh".to_vec())))
                .collect(),
        );
        let manager = ModelManager::new(dir.path(), None)
            .with_specs(all.clone())
            .with_transport(transport.clone());

        let paths = manager.check_and_download().await.unwrap();
        assert_eq!(std::fs::read(&paths.stt_encoder).unwrap(), b"fresh");
        assert_eq!(transport.requested_urls().len(), 4);
    }

    #[tokio::test]
    async fn progress_reports_each_percent_step_once() {
        let dir = tempfile::tempdir().unwrap();
        let spec = vec![ModelSpec::new(
            "tokens.txt",
            "https://huggingface.co/m/tokens.txt",
            ArtifactKind::SttTokens,
        )];
        // 10 bytes trickled 1 byte per read → exactly 10 increasing callbacks.
        let transport = ScriptedTransport::new(vec![(
            spec[0].url.as_str(),
            Outcome::Body(b"0123456789".to_vec()),
        )]);
        let manager = ModelManager::new(dir.path(), None)
            .with_specs(spec)
            .with_transport(transport);
        let mut progress = manager.subscribe_progress();

        // Only one artifact registered, so the bundle cannot assemble.
        let err = manager.check_and_download().await.unwrap_err();
        assert!(matches!(err, VoiceformError::MissingArtifact(_)));

        let percents: Vec<u8> = drain(&mut progress).into_iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[tokio::test]
    async fn bearer_token_attaches_only_for_the_model_host() {
        let dir = tempfile::tempdir().unwrap();
        let spec = vec![
            ModelSpec::new("a.bin", "https://huggingface.co/m/a.bin", ArtifactKind::SttEncoder),
            ModelSpec::new("b.bin", "https://cdn.example.com/b.bin", ArtifactKind::SttDecoder),
            ModelSpec::new("c.bin", "https://huggingface.co/m/c.bin", ArtifactKind::SttTokens),
            ModelSpec::new("d.bin", "https://huggingface.co/m/d.bin", ArtifactKind::LlmWeights),
        ];
        let transport = ScriptedTransport::new(
            spec.iter()
                .map(|s| (s.url.as_str(), Outcome::Body(b"x".to_vec())))
                .collect(),
        );
        let manager = ModelManager::new(dir.path(), Some("secret".into()))
            .with_specs(spec)
            .with_transport(transport.clone());

        manager.check_and_download().await.unwrap();

        let requests = transport.requests.lock().unwrap().clone();
        assert_eq!(requests[0].1.as_deref(), Some("secret"));
        assert_eq!(requests[1].1, None);
        assert_eq!(requests[2].1.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn missing_token_still_requests_the_model_host() {
        let dir = tempfile::tempdir().unwrap();
        let all = specs();
        let transport = ScriptedTransport::new(
            all.iter()
                .map(|s| (s.url.as_str(), Outcome::Body(b"x".to_vec())))
                .collect(),
        );
        let manager = ModelManager::new(dir.path(), None)
            .with_specs(all)
            .with_transport(transport.clone());

        manager.check_and_download().await.unwrap();
        let requests = transport.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|(_, bearer)| bearer.is_none()));
    }

    #[test]
    fn assemble_rejects_partial_bundles() {
        let mut resolved = HashMap::new();
        resolved.insert(ArtifactKind::SttEncoder, PathBuf::from("e"));
        let err = ModelPaths::assemble(resolved).unwrap_err();
        assert!(matches!(err, VoiceformError::MissingArtifact(_)));
    }

    #[test]
    fn catalog_contains_the_default_llm_release() {
        let default_llm = default_model_specs()
            .into_iter()
            .find(|s| s.kind == ArtifactKind::LlmWeights)
            .unwrap();
        assert!(llm_release_catalog()
            .iter()
            .any(|r| r.file_name == default_llm.file_name && r.url == default_llm.url));
    }

    #[test]
    fn default_registry_covers_every_artifact_kind() {
        let kinds: Vec<ArtifactKind> = default_model_specs().iter().map(|s| s.kind).collect();
        for kind in [
            ArtifactKind::SttEncoder,
            ArtifactKind::SttDecoder,
            ArtifactKind::SttTokens,
            ArtifactKind::LlmWeights,
        ] {
            assert!(kinds.contains(&kind), "missing {kind:?}");
        }
    }
}

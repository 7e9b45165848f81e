//! Download transport boundary.
//!
//! The acquisition manager consumes a synchronous request/response contract:
//! status code, optional content length, streamable body, custom headers.
//! [`HttpTransport`] implements it over blocking reqwest; tests script their
//! own implementations.

use std::io::Read;
use std::time::Duration;

use crate::error::{Result, VoiceformError};

/// One in-flight download response.
pub struct TransportResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one GET per artifact, optionally with a bearer token.
pub trait DownloadTransport: Send + Sync {
    fn fetch(&self, url: &str, bearer: Option<&str>) -> Result<TransportResponse>;
}

/// Blocking-reqwest transport with timeouts sized for multi-hundred-MB
/// artifacts on mobile links.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// # Errors
    /// `VoiceformError::Other` when the TLS backend fails to initialize.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| VoiceformError::Other(e.into()))?;
        Ok(Self { client })
    }
}

impl DownloadTransport for HttpTransport {
    fn fetch(&self, url: &str, bearer: Option<&str>) -> Result<TransportResponse> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| VoiceformError::Download {
            file_name: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(TransportResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

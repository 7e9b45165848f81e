//! Event types delivered to the caller.
//!
//! The client publishes `ClientEvent`s on a `tokio::sync::broadcast` channel
//! obtained from [`crate::client::VoiceformClient::subscribe`]. Guarantees:
//!
//! - exactly one `Ready` per `initialize()` call;
//! - `Extraction` and `Error` are mutually exclusive per action request —
//!   never both for the same request.
//!
//! The acquisition manager publishes `DownloadProgress` on its own channel;
//! completion and failure of a download run are reported through the
//! `check_and_download` return value, not here.

use serde::{Deserialize, Serialize};

/// Asynchronous listener contract of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Outcome of an `initialize()` call. `success == false` is always
    /// followed by one `Error` event carrying the failure detail.
    Ready { success: bool },
    /// A finished extraction. `json` is guaranteed to parse as a JSON object.
    Extraction { json: String },
    /// Any reported pipeline error, already mapped to a human-readable message.
    Error { message: String },
}

/// Per-file download progress. Fire-and-forget; not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub file_name: String,
    /// Integer percent in 0..=100, reported only on increase.
    pub percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_serializes_with_tagged_camel_case_variants() {
        let ready = serde_json::to_value(ClientEvent::Ready { success: true }).unwrap();
        assert_eq!(ready["type"], "ready");
        assert_eq!(ready["success"], true);

        let extraction = serde_json::to_value(ClientEvent::Extraction {
            json: "{\"a\":1}".into(),
        })
        .unwrap();
        assert_eq!(extraction["type"], "extraction");
        assert_eq!(extraction["json"], "{\"a\":1}");

        let error = serde_json::to_value(ClientEvent::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "boom");
    }

    #[test]
    fn client_event_round_trips() {
        let event = ClientEvent::Extraction {
            json: "{\"name\":\"Juan\"}".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn download_progress_serializes_with_camel_case_fields() {
        let progress = DownloadProgress {
            file_name: "tiny-encoder.int8.onnx".into(),
            percent: 42,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["fileName"], "tiny-encoder.int8.onnx");
        assert_eq!(json["percent"], 42);
    }
}

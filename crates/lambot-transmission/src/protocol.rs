//! Transmission RPC wire envelope.
//!
//! One canonical schema. The daemon's parser is strict about the nested
//! `arguments` shape and silently drops the whole argument set when it does
//! not match, so the fixtures in the tests below are the contract.

use serde::{Deserialize, Serialize};

use crate::error::TransmissionError;

/// Fields requested by `torrent-get`.
pub const TORRENT_GET_FIELDS: &[&str] = &["id", "name", "status", "rateDownload", "rateUpload"];

/// A generic RPC request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// RPC method name, e.g. `torrent-get`.
    pub method: String,
    /// Method arguments.
    pub arguments: RequestArguments,
}

impl Request {
    /// Build a `torrent-get` request for the standard listing fields.
    ///
    /// An empty `ids` slice means "all torrents": the filter is omitted
    /// entirely, since the daemon reads an empty list as "no torrents".
    #[must_use]
    pub fn torrent_get(ids: &[i64]) -> Self {
        Self {
            method: "torrent-get".to_string(),
            arguments: RequestArguments {
                fields: TORRENT_GET_FIELDS.iter().map(ToString::to_string).collect(),
                ids: ids.to_vec(),
            },
        }
    }
}

/// Arguments of an RPC request: requested fields plus an optional ID filter.
#[derive(Debug, Clone, Serialize)]
pub struct RequestArguments {
    /// Output fields to include in the response.
    pub fields: Vec<String>,
    /// Torrent IDs to filter on. Omitted from the wire when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<i64>,
}

/// Arguments payload of a `torrent-get` response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TorrentArguments {
    /// The matching torrents.
    pub torrents: Vec<Torrent>,
}

/// A single torrent record. Immutable after decode.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Torrent {
    /// Numeric identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Daemon status code.
    pub status: i64,
    /// Download rate in bytes/s.
    #[serde(rename = "rateDownload")]
    pub rate_download: i64,
    /// Upload rate in bytes/s.
    #[serde(rename = "rateUpload")]
    pub rate_upload: i64,
}

/// Raw response envelope; `arguments` is decoded per-method afterwards.
#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    arguments: serde_json::Value,
    result: String,
}

/// Decode a response body into the method-specific arguments payload.
///
/// A generic decode is insufficient: different methods return structurally
/// different `arguments`, so the caller picks the payload type.
///
/// # Errors
///
/// `Decode` on malformed JSON or a payload that does not match `T`;
/// `Daemon` when the envelope carries `result != "success"`. Partial
/// results are never surfaced.
pub fn decode_response<T: for<'de> Deserialize<'de>>(
    body: &[u8],
) -> Result<T, TransmissionError> {
    let raw: RawResponse =
        serde_json::from_slice(body).map_err(|e| TransmissionError::Decode(e.to_string()))?;

    if raw.result != "success" {
        return Err(TransmissionError::Daemon(raw.result));
    }

    serde_json::from_value(raw.arguments).map_err(|e| TransmissionError::Decode(e.to_string()))
}

//! Compression Codec
//!
//! Large values are stored as gzip-compressed JSON, base64-encoded so the
//! blob survives string-only persistence. Every blob carries a version tag.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::error::CodecError;

/// Version of the encoding produced by [`encode`].
///
/// Persisted documents written with another version are discarded at load.
pub const CODEC_VERSION: u32 = 1;

const VERSION_TAG: &str = "v1:";

// == Threshold ==
/// Whether a value of `size_bytes` should be compressed.
pub fn should_compress(size_bytes: u64, threshold: u64) -> bool {
    size_bytes > threshold
}

/// Estimated serialized size of a JSON value.
pub fn estimate_size(value: &Value) -> u64 {
    serde_json::to_vec(value).map(|v| v.len() as u64).unwrap_or(0)
}

// == Encode ==
/// Compresses a JSON value into a versioned, text-safe blob.
pub fn encode(value: &Value) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value).map_err(|e| CodecError::Json(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| CodecError::Compression(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CodecError::Compression(e.to_string()))?;

    Ok(format!("{VERSION_TAG}{}", STANDARD.encode(compressed)))
}

// == Decode ==
/// Inverse of [`encode`].
pub fn decode(blob: &str) -> Result<Value, CodecError> {
    let body = blob.strip_prefix(VERSION_TAG).ok_or_else(|| {
        let tag = blob.split(':').next().unwrap_or_default();
        CodecError::UnsupportedVersion(tag.to_string())
    })?;

    let compressed = STANDARD
        .decode(body)
        .map_err(|e| CodecError::Base64(e.to_string()))?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| CodecError::Compression(e.to_string()))?;

    serde_json::from_slice(&json).map_err(|e| CodecError::Json(e.to_string()))
}

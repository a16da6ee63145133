//! Recipient list decoding for offline-notify events.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use super::types::OfflinePushNotify;

const GZIP: &str = "gzip";

#[derive(Debug, Error)]
pub enum RecipientDecodeError {
    #[error("failed to decompress recipient list: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("recipient list is not a JSON string array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolve the target uids of an offline notify.
///
/// Only `gzip` selects the compressed list; any other indicator reads
/// `to_uids` as is. No partial list is ever returned: any gzip or JSON
/// failure fails the whole decode.
pub fn decode_recipients(notify: &OfflinePushNotify) -> Result<Vec<String>, RecipientDecodeError> {
    match notify.compress.as_deref() {
        None | Some("") => Ok(notify.to_uids.clone()),
        Some(GZIP) => {
            if notify.compress_to_uids.is_empty() {
                return Ok(Vec::new());
            }
            let mut decoder = GzDecoder::new(notify.compress_to_uids.as_slice());
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw)?;
            Ok(serde_json::from_slice(&raw)?)
        }
        Some(other) => {
            tracing::warn!(compress = other, "Unknown recipient compression, using plain list");
            Ok(notify.to_uids.clone())
        }
    }
}

/// Gzip a uid list the way the messaging core does.
pub fn encode_recipients(uids: &[String]) -> Result<Vec<u8>, RecipientDecodeError> {
    let json = serde_json::to_vec(uids)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

//! Envelope payload compression

use crate::core_codec::errors::{CodecError, CodecResult};
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Compression applied to an envelope payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Raw DEFLATE stream
    Deflate,
    /// Gzip framing around DEFLATE
    Gzip,
}

impl Compression {
    /// Tag stored on the envelope
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Deflate => "deflate",
            Compression::Gzip => "gzip",
        }
    }

    /// Compress `payload`
    pub fn compress(&self, payload: &[u8]) -> CodecResult<Vec<u8>> {
        let level = flate2::Compression::default();
        let result = match self {
            Compression::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), level);
                encoder.write_all(payload).and_then(|_| encoder.finish())
            }
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(payload).and_then(|_| encoder.finish())
            }
        };

        result.map_err(|e| CodecError::Compression(format!("{} encode: {}", self, e)))
    }

    /// Decompress `payload`, refusing output larger than `max_bytes`
    pub fn decompress(&self, payload: &[u8], max_bytes: usize) -> CodecResult<Vec<u8>> {
        // One byte past the cap is enough to detect an oversized payload.
        let limit = (max_bytes as u64).saturating_add(1);
        let mut out = Vec::new();

        let result = match self {
            Compression::Deflate => DeflateDecoder::new(payload).take(limit).read_to_end(&mut out),
            Compression::Gzip => GzDecoder::new(payload).take(limit).read_to_end(&mut out),
        };

        result.map_err(|e| CodecError::Decode(format!("{} payload is corrupt: {}", self, e)))?;

        if out.len() > max_bytes {
            return Err(CodecError::Decode(format!(
                "{} payload exceeds {} bytes when decompressed",
                self, max_bytes
            )));
        }

        Ok(out)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        match s.to_lowercase().as_str() {
            "deflate" => Ok(Compression::Deflate),
            "gzip" | "gz" => Ok(Compression::Gzip),
            other => Err(CodecError::Compression(format!("unknown compression: {}", other))),
        }
    }
}

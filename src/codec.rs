// src/codec.rs
// Reversible string compression for the cached prediction blob

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    Compress(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("corrupt deflate stream: {0}")]
    Inflate(String),
    #[error("decompressed data is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// DEFLATE + base64, so the output is a plain string any store can hold.
#[derive(Debug, Clone, Copy)]
pub struct CompressionCodec {
    level: Compression,
}

impl Default for CompressionCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl CompressionCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn compress(&self, text: &str) -> Result<String, CodecError> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(text.len() / 2), self.level);
        encoder
            .write_all(text.as_bytes())
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        let bytes = encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    pub fn decompress(&self, data: &str) -> Result<String, CodecError> {
        let bytes = STANDARD.decode(data.trim())?;
        let mut decoder = DeflateDecoder::new(bytes.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Inflate(e.to_string()))?;
        Ok(String::from_utf8(out)?)
    }

    /// Compressed size over original size
    pub fn ratio(original: &str, compressed: &str) -> f32 {
        if original.is_empty() {
            return 1.0;
        }
        compressed.len() as f32 / original.len() as f32
    }
}

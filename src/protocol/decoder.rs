//! Frame record builder
//!
//! Composes the tokenizer and the converter into a [`FrameRecord`].

use chrono::{DateTime, Utc};

use crate::protocol::convert::convert_token;
use crate::protocol::tokenizer::tokenize;
use crate::types::{DataFields, FrameRecord};

/// Decodes raw text lines into frame records
///
/// The decoder holds no state between lines; it is a type so the reader
/// worker and tests share one entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self
    }

    /// Decode a line, stamping it with the current host time
    pub fn decode(&self, line: &str) -> FrameRecord {
        self.decode_at(line, Utc::now())
    }

    /// Decode a line with an explicit host timestamp
    pub fn decode_at(&self, line: &str, timestamp: DateTime<Utc>) -> FrameRecord {
        let tokens = tokenize(line);

        let mut data_fields = DataFields::new();
        for token in &tokens.field_tokens {
            if let Some((name, value)) = convert_token(token) {
                data_fields.upsert(name, value);
            }
        }

        let text = match tokens.message {
            Some(ref message) => message.clone(),
            None => tokens.residual_text(),
        };

        tracing::trace!(
            level = %tokens.level,
            fields = data_fields.len(),
            device_ts = ?tokens.device_timestamp,
            "decoded frame"
        );

        FrameRecord {
            timestamp,
            level: tokens.level,
            text,
            device_timestamp: tokens.device_timestamp,
            data_fields,
        }
    }
}

/// Decode a line with a default decoder
pub fn decode_line(line: &str) -> FrameRecord {
    FrameDecoder::new().decode(line)
}

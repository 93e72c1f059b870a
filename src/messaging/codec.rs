//! # Work Item Codec
//!
//! Plain-text wire format shared by both queues: `<field1>|<field2>` encoded as
//! UTF-8, with no structured encoding and no escaping.
//!
//! Extracted text is not escaped on the way out. A result whose text contains
//! the delimiter is ambiguous to the consumer; that limitation is part of the
//! wire contract and is preserved here.

use thiserror::Error;

use crate::constants::wire::{FIELD_COUNT, FIELD_DELIMITER};

/// One unit of pipeline input parsed from an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub document_id: String,
    pub object_key: String,
}

/// Text produced by OCR for one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub document_id: String,
    pub text: String,
}

impl ExtractionResult {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
        }
    }

    /// Encode for the outbound queue
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&self.document_id, &self.text)
    }
}

/// Errors raised for inbound bodies that do not follow the wire format
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("message body is not valid UTF-8: {message}")]
    InvalidUtf8 { message: String },

    #[error("message body has {actual} '|'-delimited fields, expected {expected}")]
    FieldCount { expected: usize, actual: usize },
}

/// Parse an inbound body into a [`WorkItem`]
///
/// Succeeds only when the body splits into exactly two fields. Field values
/// themselves may be empty.
pub fn parse(body: &[u8]) -> Result<WorkItem, FormatError> {
    let text = std::str::from_utf8(body).map_err(|e| FormatError::InvalidUtf8 {
        message: e.to_string(),
    })?;

    let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(FormatError::FieldCount {
            expected: FIELD_COUNT,
            actual: fields.len(),
        });
    }

    Ok(WorkItem {
        document_id: fields[0].to_string(),
        object_key: fields[1].to_string(),
    })
}

/// Encode `"{document_id}|{text}"` as UTF-8 bytes
pub fn encode(document_id: &str, text: &str) -> Vec<u8> {
    let mut body = String::with_capacity(document_id.len() + text.len() + 1);
    body.push_str(document_id);
    body.push(FIELD_DELIMITER);
    body.push_str(text);
    body.into_bytes()
}

use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

/// Failures while moving update messages through their wire form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("serialize failure: {0}")]
    Serialize(String),

    #[error("validation failure: {0}")]
    Validation(String),

    #[error("unexpected envelope tag {found} (expected {expected})")]
    UnexpectedTag { found: u8, expected: u8 },

    #[error("schema version mismatch: {found} vs {expected}")]
    SchemaVersion { found: u8, expected: u8 },

    #[error("no codec registered for payload type `{0}`")]
    UnknownPayloadType(String),

    #[error("payload is not a `{expected}`")]
    PayloadMismatch { expected: &'static str },
}

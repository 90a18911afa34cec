use rkyv::{
    api::high::{access, to_bytes, HighSerializer, HighValidator},
    bytecheck::CheckBytes,
    rancor::Error,
    ser::allocator::ArenaHandle,
    util::AlignedVec,
    Archive, Serialize,
};
use transport::Envelope;

use crate::error::{CodecError, CodecResult};
use crate::schema::SCHEMA_VERSION_V1;

pub(crate) fn serialize<T>(value: &T) -> CodecResult<Vec<u8>>
where
    T: Archive,
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
{
    to_bytes::<Error>(value)
        .map(|aligned| aligned.into_vec())
        .map_err(|err| CodecError::Serialize(err.to_string()))
}

/// Copies wire bytes into a buffer aligned for archived access. Record and
/// nested payload bytes carry no alignment guarantee of their own.
pub(crate) fn aligned(bytes: &[u8]) -> AlignedVec {
    let mut out = AlignedVec::<16>::with_capacity(bytes.len());
    out.extend_from_slice(bytes);
    out
}

pub(crate) fn archived_root<T>(payload: &[u8]) -> CodecResult<&rkyv::Archived<T>>
where
    T: Archive,
    T::Archived: for<'a> CheckBytes<HighValidator<'a, Error>>,
{
    access::<T::Archived, Error>(payload).map_err(|err| CodecError::Validation(err.to_string()))
}

pub(crate) fn ensure_tag(envelope: Envelope, expected: u8) -> CodecResult<()> {
    if envelope.tag != expected {
        return Err(CodecError::UnexpectedTag {
            found: envelope.tag,
            expected,
        });
    }
    if envelope.version != SCHEMA_VERSION_V1 {
        return Err(CodecError::SchemaVersion {
            found: envelope.version,
            expected: SCHEMA_VERSION_V1,
        });
    }
    Ok(())
}

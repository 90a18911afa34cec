//! Wire schema for update messages crossing a process boundary.
//!
//! `rkyv` expands `Archive` derives into generated archived structs that
//! inherit `#[allow(missing_docs)]`. Any backward-incompatible change must
//! bump [`SCHEMA_VERSION_V1`].
#![allow(missing_docs)]

use rkyv::{Archive, Serialize};

/// Schema version for serialized update messages.
pub const SCHEMA_VERSION_V1: u8 = 1;

/// Envelope tag for an update message.
pub const TAG_UPDATE_MESSAGE: u8 = 0x21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `UpdateTypeV1`."),
    bytecheck()
)]
pub enum UpdateTypeV1 {
    Add,
    Revoke,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `IuStatusV1`."),
    bytecheck()
)]
pub enum IuStatusV1 {
    Active,
    Revoked,
    Committed,
}

/// One unit as seen by the sender. Ids are the sender's ids.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `WireUnitV1`."),
    bytecheck()
)]
pub struct WireUnitV1 {
    pub id: u64,
    pub creator: String,
    /// Age at encode time; the receiver has its own monotonic clock.
    pub age_micros: u64,
    pub payload_type: String,
    /// Payload bytes produced by the registered payload codec.
    pub payload: Vec<u8>,
    pub grounded_in: Vec<u64>,
    pub previous: Option<u64>,
    pub status: IuStatusV1,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `WireEntryV1`."),
    bytecheck()
)]
pub struct WireEntryV1 {
    pub update: UpdateTypeV1,
    pub unit: WireUnitV1,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `UpdateMessageV1`."),
    bytecheck()
)]
pub struct UpdateMessageV1 {
    pub entries: Vec<WireEntryV1>,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `TextV1`."),
    bytecheck()
)]
pub struct TextV1 {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `AudioV1`."),
    bytecheck()
)]
pub struct AudioV1 {
    pub raw: Vec<u8>,
    pub rate: u32,
    pub nframes: u32,
    pub sample_width: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize)]
#[rkyv(
    attr(allow(missing_docs), doc = "Archived representation of `SpeechV1`."),
    bytecheck()
)]
pub struct SpeechV1 {
    pub audio: AudioV1,
    pub dispatch: bool,
}

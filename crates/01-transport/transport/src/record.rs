/// Header of a record on a byte-carrying edge. The receiver checks both
/// fields before reading the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Which schema the payload bytes follow.
    pub tag: u8,
    /// Revision of that schema the sender wrote.
    pub version: u8,
}

impl Envelope {
    pub const fn new(tag: u8, version: u8) -> Self {
        Self { tag, version }
    }
}

/// Serialized message queued on a byte-carrying edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub envelope: Envelope,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(envelope: Envelope, payload: Vec<u8>) -> Self {
        Self { envelope, payload }
    }
}

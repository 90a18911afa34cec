//! Payload abstraction and the standard payload types.
//!
//! A unit's payload is type-erased behind [`DynPayload`] so one network can
//! carry audio frames next to word hypotheses. Each concrete payload declares
//! a static [`PayloadType`] tag; modules declare the tags they accept and
//! produce, and the network checks compatibility once at wiring time instead
//! of on every message.

use std::any::Any;
use std::fmt;

use serde::Serialize;

/// Static tag naming a payload type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PayloadType(&'static str);

impl PayloadType {
    /// Wildcard input type: accepts every payload.
    pub const ANY: PayloadType = PayloadType("*");

    pub const fn new(tag: &'static str) -> Self {
        PayloadType(tag)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }

    /// Whether an input declared as `self` accepts units tagged `produced`.
    pub fn accepts(self, produced: PayloadType) -> bool {
        self == PayloadType::ANY || self == produced
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Implemented by every concrete payload carried in a unit.
pub trait Payload: fmt::Debug + Send + Sync + 'static {
    const TYPE: PayloadType;
}

/// Object-safe view of a [`Payload`]; implemented for every payload.
pub trait DynPayload: fmt::Debug + Send + Sync + 'static {
    fn payload_type(&self) -> PayloadType;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Payload> DynPayload for T {
    fn payload_type(&self) -> PayloadType {
        T::TYPE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DynPayload {
    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Payload>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Recognized or generated text, e.g. one word hypothesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
    pub text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Payload for Text {
    const TYPE: PayloadType = PayloadType::new("text");
}

/// Raw monaural audio chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Audio {
    /// Interleaved little-endian PCM bytes.
    pub raw: Vec<u8>,
    /// Frame rate in Hertz.
    pub rate: u32,
    /// Number of frames contained in `raw`.
    pub nframes: u32,
    /// Bytes per sample.
    pub sample_width: u16,
}

impl Audio {
    /// Length of the chunk in seconds.
    pub fn audio_length(&self) -> f64 {
        if self.rate == 0 {
            return 0.0;
        }
        f64::from(self.nframes) / f64::from(self.rate)
    }
}

impl Payload for Audio {
    const TYPE: PayloadType = PayloadType::new("audio");
}

/// Synthesized speech chunk plus whether it should be dispatched to output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Speech {
    pub audio: Audio,
    pub dispatch: bool,
}

impl Payload for Speech {
    const TYPE: PayloadType = PayloadType::new("speech");
}

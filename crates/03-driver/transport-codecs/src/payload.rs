//! Per-type payload codecs and the registry that selects them by tag.

use std::collections::HashMap;
use std::sync::Arc;

use iu::{Audio, DynPayload, Payload, PayloadType, Speech, Text};

use crate::archive::{aligned, archived_root, serialize};
use crate::error::{CodecError, CodecResult};
use crate::schema::{ArchivedAudioV1, AudioV1, SpeechV1, TextV1};

/// Serializes one payload type. Registered in a [`PayloadRegistry`] under
/// [`PayloadCodec::payload_type`].
pub trait PayloadCodec: Send + Sync {
    fn payload_type(&self) -> PayloadType;

    fn encode(&self, payload: &dyn DynPayload) -> CodecResult<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> CodecResult<Arc<dyn DynPayload>>;
}

fn expect<P: Payload>(payload: &dyn DynPayload) -> CodecResult<&P> {
    payload
        .downcast_ref::<P>()
        .ok_or(CodecError::PayloadMismatch {
            expected: P::TYPE.as_str(),
        })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TextCodec;

impl PayloadCodec for TextCodec {
    fn payload_type(&self) -> PayloadType {
        Text::TYPE
    }

    fn encode(&self, payload: &dyn DynPayload) -> CodecResult<Vec<u8>> {
        let text = expect::<Text>(payload)?;
        serialize(&TextV1 {
            text: text.text.clone(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Arc<dyn DynPayload>> {
        let bytes = aligned(bytes);
        let archived = archived_root::<TextV1>(&bytes)?;
        Ok(Arc::new(Text::new(archived.text.as_str())))
    }
}

fn audio_to_wire(audio: &Audio) -> AudioV1 {
    AudioV1 {
        raw: audio.raw.clone(),
        rate: audio.rate,
        nframes: audio.nframes,
        sample_width: audio.sample_width,
    }
}

fn audio_from_wire(audio: &ArchivedAudioV1) -> Audio {
    Audio {
        raw: audio.raw.as_slice().to_vec(),
        rate: audio.rate.to_native(),
        nframes: audio.nframes.to_native(),
        sample_width: audio.sample_width.to_native(),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AudioCodec;

impl PayloadCodec for AudioCodec {
    fn payload_type(&self) -> PayloadType {
        Audio::TYPE
    }

    fn encode(&self, payload: &dyn DynPayload) -> CodecResult<Vec<u8>> {
        serialize(&audio_to_wire(expect::<Audio>(payload)?))
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Arc<dyn DynPayload>> {
        let bytes = aligned(bytes);
        let archived = archived_root::<AudioV1>(&bytes)?;
        Ok(Arc::new(audio_from_wire(archived)))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SpeechCodec;

impl PayloadCodec for SpeechCodec {
    fn payload_type(&self) -> PayloadType {
        Speech::TYPE
    }

    fn encode(&self, payload: &dyn DynPayload) -> CodecResult<Vec<u8>> {
        let speech = expect::<Speech>(payload)?;
        serialize(&SpeechV1 {
            audio: audio_to_wire(&speech.audio),
            dispatch: speech.dispatch,
        })
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Arc<dyn DynPayload>> {
        let bytes = aligned(bytes);
        let archived = archived_root::<SpeechV1>(&bytes)?;
        Ok(Arc::new(Speech {
            audio: audio_from_wire(&archived.audio),
            dispatch: archived.dispatch,
        }))
    }
}

/// Payload codecs keyed by payload type tag.
#[derive(Clone, Default)]
pub struct PayloadRegistry {
    codecs: HashMap<&'static str, Arc<dyn PayloadCodec>>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with codecs for [`Text`], [`Audio`] and [`Speech`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TextCodec);
        registry.register(AudioCodec);
        registry.register(SpeechCodec);
        registry
    }

    /// Adds or replaces the codec for its payload type.
    pub fn register<C: PayloadCodec + 'static>(&mut self, codec: C) -> &mut Self {
        self.codecs
            .insert(codec.payload_type().as_str(), Arc::new(codec));
        self
    }

    pub fn get(&self, payload_type: &str) -> CodecResult<&Arc<dyn PayloadCodec>> {
        self.codecs
            .get(payload_type)
            .ok_or_else(|| CodecError::UnknownPayloadType(payload_type.to_owned()))
    }

    pub fn contains(&self, payload_type: PayloadType) -> bool {
        self.codecs.contains_key(payload_type.as_str())
    }
}

//! Serialized edges for the incremental-unit network.
//!
//! Update messages and their units are archived with `rkyv` behind a tagged
//! [`transport::Envelope`]. Payloads go through per-type [`PayloadCodec`]s
//! looked up in a [`PayloadRegistry`]; the receiving side rebuilds units as
//! mirrors tracked in a [`MirrorTable`]. [`CodecChannel`] packages all of it
//! as a [`transport::Channel`] so a serialized edge plugs into a network like
//! any in-process buffer.

mod archive;
mod channel;
mod error;
mod payload;
pub mod schema;
mod wire;

pub use channel::CodecChannel;
pub use error::{CodecError, CodecResult};
pub use payload::{AudioCodec, PayloadCodec, PayloadRegistry, SpeechCodec, TextCodec};
pub use wire::{decode_update, encode_update, MirrorTable};

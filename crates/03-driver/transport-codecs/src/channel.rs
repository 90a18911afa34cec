use std::sync::Arc;

use iu::UpdateMessage;
use parking_lot::Mutex;
use transport::{
    Buffer, BufferConfig, CancelToken, Channel, Doorbell, PortMetricsSnapshot, PushOutcome, Record,
    TransportError, TransportResult,
};

use crate::payload::PayloadRegistry;
use crate::wire::{decode_update, encode_update, MirrorTable};

/// Terminal mirrors are forgotten once the table grows past this size.
const MIRROR_PRUNE_THRESHOLD: usize = 4096;

/// Edge that carries update messages in serialized form.
///
/// Messages are encoded on push and decoded on pop, so producer and consumer
/// share no unit handles. Drop-in replacement for an in-process buffer.
pub struct CodecChannel {
    inner: Buffer<Record>,
    registry: Arc<PayloadRegistry>,
    mirrors: Mutex<MirrorTable>,
}

impl CodecChannel {
    pub fn new(config: BufferConfig, registry: Arc<PayloadRegistry>) -> TransportResult<Self> {
        Self::with_doorbell(config, registry, Arc::new(Doorbell::new()))
    }

    pub fn with_doorbell(
        config: BufferConfig,
        registry: Arc<PayloadRegistry>,
        bell: Arc<Doorbell>,
    ) -> TransportResult<Self> {
        Ok(Self {
            inner: Buffer::with_doorbell(config, bell)?,
            registry,
            mirrors: Mutex::new(MirrorTable::new()),
        })
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.lock().len()
    }

    fn encode(&self, message: &UpdateMessage) -> TransportResult<Record> {
        encode_update(message, &self.registry).map_err(|err| TransportError::codec(err.to_string()))
    }
}

impl Channel<UpdateMessage> for CodecChannel {
    fn push_cancellable(&self, item: UpdateMessage, cancel: &CancelToken) -> TransportResult<PushOutcome> {
        let record = self.encode(&item)?;
        self.inner.push_cancellable(record, cancel)
    }

    fn try_push(&self, item: UpdateMessage) -> TransportResult<PushOutcome> {
        let record = self.encode(&item)?;
        self.inner.try_push(record)
    }

    fn try_pop(&self) -> Option<UpdateMessage> {
        loop {
            let record = self.inner.try_pop()?;
            let mut mirrors = self.mirrors.lock();
            match decode_update(&record, &self.registry, &mut mirrors) {
                Ok(message) => {
                    if mirrors.len() > MIRROR_PRUNE_THRESHOLD {
                        mirrors.prune_terminal();
                    }
                    return Some(message);
                }
                Err(err) => tracing::warn!(%err, "dropping undecodable record"),
            }
        }
    }

    fn close(&self) {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn config(&self) -> BufferConfig {
        self.inner.config()
    }

    fn metrics(&self) -> PortMetricsSnapshot {
        self.inner.metrics()
    }

    fn consumer_bell(&self) -> Arc<Doorbell> {
        Arc::clone(self.inner.data_bell())
    }
}

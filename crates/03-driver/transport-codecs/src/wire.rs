//! Update message <-> wire record conversion.
//!
//! Units are shared references in process but must be rebuilt on the far
//! side of a serialized edge. The receiver keeps a [`MirrorTable`] so that
//! every remote id maps to exactly one local mirror: a later REVOKE or COMMIT
//! entry updates the mirror the consumer already holds, and grounding links
//! point at mirrors. Links to units that never crossed the edge keep the
//! sender's id without resolving.

use std::collections::HashMap;
use std::time::Duration;

use iu::{
    Iu, IuBuilder, IuId, IuStatus, ModuleId, Transition, UpdateMessage, UpdateType, WeakIu,
};
use transport::{Envelope, Record};

use crate::archive::{aligned, archived_root, ensure_tag, serialize};
use crate::error::CodecResult;
use crate::payload::PayloadRegistry;
use crate::schema::{
    ArchivedIuStatusV1, ArchivedUpdateTypeV1, ArchivedWireUnitV1, IuStatusV1, UpdateMessageV1,
    UpdateTypeV1, WireEntryV1, WireUnitV1, SCHEMA_VERSION_V1, TAG_UPDATE_MESSAGE,
};

/// Serializes `message` into a tagged record.
pub fn encode_update(message: &UpdateMessage, registry: &PayloadRegistry) -> CodecResult<Record> {
    let entries = message
        .iter()
        .map(|(iu, update)| {
            Ok(WireEntryV1 {
                update: update_to_wire(update),
                unit: unit_to_wire(iu, registry)?,
            })
        })
        .collect::<CodecResult<Vec<_>>>()?;
    let payload = serialize(&UpdateMessageV1 { entries })?;
    Ok(Record::new(
        Envelope::new(TAG_UPDATE_MESSAGE, SCHEMA_VERSION_V1),
        payload,
    ))
}

/// Rebuilds the message in `record`, resolving units through `mirrors`.
///
/// Entries that cannot form a valid message on this side (an ADD for a
/// mirror that is no longer active) are dropped; the receiving module's
/// ledger sees the same stream it would have seen in process.
pub fn decode_update(
    record: &Record,
    registry: &PayloadRegistry,
    mirrors: &mut MirrorTable,
) -> CodecResult<UpdateMessage> {
    ensure_tag(record.envelope, TAG_UPDATE_MESSAGE)?;
    let bytes = aligned(&record.payload);
    let archived = archived_root::<UpdateMessageV1>(&bytes)?;
    let mut message = UpdateMessage::new();
    for entry in archived.entries.iter() {
        let unit = mirrors.sync(&entry.unit, registry)?;
        let update = update_from_wire(&entry.update);
        if let Err(err) = message.push(unit, update) {
            tracing::debug!(%err, "dropping wire entry");
        }
    }
    Ok(message)
}

fn unit_to_wire(iu: &Iu, registry: &PayloadRegistry) -> CodecResult<WireUnitV1> {
    let payload_type = iu.payload_type();
    let payload = registry.get(payload_type.as_str())?.encode(iu.payload())?;
    Ok(WireUnitV1 {
        id: iu.id().get(),
        creator: iu.creator().as_str().to_owned(),
        age_micros: u64::try_from(iu.age().as_micros()).unwrap_or(u64::MAX),
        payload_type: payload_type.as_str().to_owned(),
        payload,
        grounded_in: iu.grounded_in_ids().map(|id| id.get()).collect(),
        previous: iu.previous_id().map(|id| id.get()),
        status: status_to_wire(iu.status()),
    })
}

fn update_to_wire(update: UpdateType) -> UpdateTypeV1 {
    match update {
        UpdateType::Add => UpdateTypeV1::Add,
        UpdateType::Revoke => UpdateTypeV1::Revoke,
        UpdateType::Commit => UpdateTypeV1::Commit,
    }
}

fn update_from_wire(update: &ArchivedUpdateTypeV1) -> UpdateType {
    match update {
        ArchivedUpdateTypeV1::Add => UpdateType::Add,
        ArchivedUpdateTypeV1::Revoke => UpdateType::Revoke,
        ArchivedUpdateTypeV1::Commit => UpdateType::Commit,
    }
}

fn status_to_wire(status: IuStatus) -> IuStatusV1 {
    match status {
        IuStatus::Active => IuStatusV1::Active,
        IuStatus::Revoked => IuStatusV1::Revoked,
        IuStatus::Committed => IuStatusV1::Committed,
    }
}

fn status_from_wire(status: &ArchivedIuStatusV1) -> IuStatus {
    match status {
        ArchivedIuStatusV1::Active => IuStatus::Active,
        ArchivedIuStatusV1::Revoked => IuStatus::Revoked,
        ArchivedIuStatusV1::Committed => IuStatus::Committed,
    }
}

/// Local mirrors of remote units, keyed by the sender's id.
#[derive(Debug, Default)]
pub struct MirrorTable {
    mirrors: HashMap<u64, Iu>,
}

impl MirrorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, remote: u64) -> Option<&Iu> {
        self.mirrors.get(&remote)
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Forgets mirrors whose status can no longer change. Later links to a
    /// forgotten id keep the sender's id but no longer resolve.
    pub fn prune_terminal(&mut self) -> usize {
        let before = self.mirrors.len();
        self.mirrors.retain(|_, iu| iu.is_active());
        before - self.mirrors.len()
    }

    /// Link to the mirror of `remote`, or a dangling link that keeps the
    /// sender's id when the unit never crossed this edge.
    fn link(&self, remote: u64) -> WeakIu {
        match self.mirrors.get(&remote) {
            Some(mirror) => mirror.downgrade(),
            None => {
                tracing::trace!(remote, "link target not mirrored");
                WeakIu::dangling(IuId::from_raw(remote))
            }
        }
    }

    fn sync(&mut self, unit: &ArchivedWireUnitV1, registry: &PayloadRegistry) -> CodecResult<Iu> {
        let remote = unit.id.to_native();
        let status = status_from_wire(&unit.status);
        if let Some(mirror) = self.mirrors.get(&remote) {
            let result = match status {
                IuStatus::Active => Ok(Transition::Unchanged),
                IuStatus::Revoked => mirror.revoke(),
                IuStatus::Committed => mirror.commit(),
            };
            if let Err(err) = result {
                tracing::debug!(remote, %err, "mirror status conflict");
            }
            return Ok(mirror.clone());
        }

        let payload = registry
            .get(unit.payload_type.as_str())?
            .decode(unit.payload.as_slice())?;
        let mut builder = IuBuilder::from_arc(ModuleId::from(unit.creator.as_str()), payload);
        for ground in unit.grounded_in.iter() {
            builder = builder.grounded_in_link(self.link(ground.to_native()));
        }
        if let Some(previous) = unit.previous.as_ref() {
            builder = builder.previous_link(self.link(previous.to_native()));
        }
        let mirror = builder.build_mirror(Duration::from_micros(unit.age_micros.to_native()), status);
        self.mirrors.insert(remote, mirror.clone());
        Ok(mirror)
    }
}

//! Update messages: the only thing ever transmitted between modules.

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{IuError, IuResult};
use crate::id::IuId;
use crate::payload::PayloadType;
use crate::unit::{Iu, IuStatus};

/// What an entry in an [`UpdateMessage`] asks the receiver to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Add,
    Revoke,
    Commit,
}

impl UpdateType {
    /// Status the unit is expected to have once the entry is applied.
    pub fn target_status(self) -> IuStatus {
        match self {
            UpdateType::Add => IuStatus::Active,
            UpdateType::Revoke => IuStatus::Revoked,
            UpdateType::Commit => IuStatus::Committed,
        }
    }
}

/// Ordered batch of `(unit, update type)` entries emitted by one processing
/// step. A unit appears at most once. Cloning copies the reference list; the
/// units themselves are shared.
#[derive(Clone, Debug, Default)]
pub struct UpdateMessage {
    entries: SmallVec<[(Iu, UpdateType); 4]>,
}

impl UpdateMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry message.
    pub fn from_iu(iu: Iu, update: UpdateType) -> IuResult<Self> {
        let mut message = Self::new();
        message.push(iu, update)?;
        Ok(message)
    }

    /// Message applying the same update type to every unit, in order.
    pub fn from_ius(ius: impl IntoIterator<Item = Iu>, update: UpdateType) -> IuResult<Self> {
        let mut message = Self::new();
        for iu in ius {
            message.push(iu, update)?;
        }
        Ok(message)
    }

    /// Appends an entry. Rejects a second entry for the same unit and an
    /// `Add` of a unit that is no longer active.
    pub fn push(&mut self, iu: Iu, update: UpdateType) -> IuResult<()> {
        if self.contains(iu.id()) {
            return Err(IuError::DuplicateIu { id: iu.id() });
        }
        if update == UpdateType::Add {
            let status = iu.status();
            if status != IuStatus::Active {
                return Err(IuError::NotActive {
                    id: iu.id(),
                    status,
                });
            }
        }
        self.entries.push((iu, update));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Iu, UpdateType)> + '_ {
        self.entries.iter().map(|(iu, update)| (iu, *update))
    }

    pub fn units(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.entries.iter().map(|(iu, _)| iu)
    }

    fn of_type(&self, wanted: UpdateType) -> impl Iterator<Item = &Iu> + '_ {
        self.entries
            .iter()
            .filter(move |(_, update)| *update == wanted)
            .map(|(iu, _)| iu)
    }

    pub fn added(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.of_type(UpdateType::Add)
    }

    pub fn revoked(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.of_type(UpdateType::Revoke)
    }

    pub fn committed(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.of_type(UpdateType::Commit)
    }

    pub fn contains(&self, id: IuId) -> bool {
        self.entries.iter().any(|(iu, _)| iu.id() == id)
    }

    pub fn get(&self, id: IuId) -> Option<(&Iu, UpdateType)> {
        self.iter().find(|(iu, _)| iu.id() == id)
    }

    /// Whether every unit carries one of `accepted` (wildcards included).
    pub fn has_valid_units(&self, accepted: &[PayloadType]) -> bool {
        self.units().all(|iu| {
            accepted
                .iter()
                .any(|declared| declared.accepts(iu.payload_type()))
        })
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Iu, UpdateType) -> bool) {
        self.entries.retain(|(iu, update)| keep(&*iu, *update));
    }
}

impl IntoIterator for UpdateMessage {
    type Item = (Iu, UpdateType);
    type IntoIter = smallvec::IntoIter<[(Iu, UpdateType); 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a UpdateMessage {
    type Item = &'a (Iu, UpdateType);
    type IntoIter = std::slice::Iter<'a, (Iu, UpdateType)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

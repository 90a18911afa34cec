//! Per-module bookkeeping of which units are live on either side.
//!
//! The input ledger enforces the receiving half of the update protocol:
//! REVOKE and COMMIT only make sense for units previously added, and a unit
//! is added at most once. The output ledger tracks what the module itself
//! has published so that its own REVOKE/COMMIT entries can be checked and
//! the grounding invariant validated after every step.
//!
//! Only active units are held strongly. Revoked and committed units are
//! remembered through weak links and forgotten once the unit is dropped:
//! an update for a unit can only be sent by someone still holding it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use iu::{Iu, IuId, ModuleId, UpdateMessage, UpdateType, WeakIu};

use crate::error::ModuleError;

const RETIRED_PRUNE_FLOOR: usize = 256;

/// Units that left the active set.
#[derive(Debug)]
struct Retired {
    units: HashMap<IuId, WeakIu>,
    prune_at: usize,
}

impl Default for Retired {
    fn default() -> Self {
        Self {
            units: HashMap::new(),
            prune_at: RETIRED_PRUNE_FLOOR,
        }
    }
}

impl Retired {
    fn contains(&self, id: IuId) -> bool {
        self.units.contains_key(&id)
    }

    fn insert(&mut self, iu: &Iu) {
        self.units.insert(iu.id(), iu.downgrade());
        if self.units.len() >= self.prune_at {
            self.units.retain(|_, unit| unit.is_alive());
            self.prune_at = (self.units.len() * 2).max(RETIRED_PRUNE_FLOOR);
        }
    }

    /// Retired units somebody still holds.
    fn live(&self) -> impl Iterator<Item = Iu> + '_ {
        self.units.values().filter_map(WeakIu::upgrade)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.units.len()
    }
}

#[derive(Debug, Default)]
pub(crate) struct InputLedger {
    active: HashMap<IuId, (Arc<str>, Iu)>,
    retired: Retired,
}

impl InputLedger {
    /// Filters `message` down to the entries that respect the protocol and
    /// applies their status changes. Dropped entries are returned as errors.
    pub(crate) fn admit(
        &mut self,
        module: &ModuleId,
        input: &Arc<str>,
        mut message: UpdateMessage,
        errors: &mut Vec<ModuleError>,
    ) -> UpdateMessage {
        message.retain(|iu, update| {
            let id = iu.id();
            let reject = |reason| ModuleError::Protocol {
                module: module.clone(),
                id,
                update,
                reason,
            };
            match update {
                UpdateType::Add => {
                    if self.active.contains_key(&id) || self.retired.contains(id) {
                        errors.push(reject("unit already added"));
                        return false;
                    }
                    self.active.insert(id, (Arc::clone(input), iu.clone()));
                    true
                }
                UpdateType::Revoke | UpdateType::Commit => {
                    if !self.active.contains_key(&id) && !self.retired.contains(id) {
                        errors.push(reject("unit never added"));
                        return false;
                    }
                    let applied = if update == UpdateType::Revoke {
                        iu.revoke()
                    } else {
                        iu.commit()
                    };
                    if let Err(source) = applied {
                        errors.push(ModuleError::Transition {
                            module: module.clone(),
                            source,
                        });
                        return false;
                    }
                    self.active.remove(&id);
                    self.retired.insert(iu);
                    true
                }
            }
        });
        message
    }

    pub(crate) fn get(&self, id: IuId) -> Option<&Iu> {
        self.active.get(&id).map(|(_, iu)| iu)
    }

    pub(crate) fn units(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.active.values().map(|(_, iu)| iu)
    }

    pub(crate) fn units_from<'a>(&'a self, input: &'a str) -> impl Iterator<Item = &'a Iu> + 'a {
        self.active
            .values()
            .filter(move |(from, _)| from.as_ref() == input)
            .map(|(_, iu)| iu)
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    pub(crate) fn retired_len(&self) -> usize {
        self.retired.len()
    }
}

#[derive(Debug, Default)]
pub(crate) struct OutputLedger {
    active: HashMap<IuId, Iu>,
    committed: Retired,
    revoked: Retired,
    flagged: HashSet<IuId>,
    last_added: Option<WeakIu>,
}

impl OutputLedger {
    /// Checks ownership and protocol of an outgoing message and applies its
    /// REVOKE/COMMIT entries. Returns whether the set of live outputs changed.
    pub(crate) fn publish(
        &mut self,
        module: &ModuleId,
        message: &mut UpdateMessage,
        errors: &mut Vec<ModuleError>,
    ) -> bool {
        let mut changed = false;
        message.retain(|iu, update| {
            let id = iu.id();
            if iu.creator() != module {
                errors.push(ModuleError::ForeignUnit {
                    module: module.clone(),
                    id,
                    creator: iu.creator().clone(),
                });
                return false;
            }
            let known = self.active.contains_key(&id)
                || self.committed.contains(id)
                || self.revoked.contains(id);
            let reject = |reason| ModuleError::Protocol {
                module: module.clone(),
                id,
                update,
                reason,
            };
            match update {
                UpdateType::Add => {
                    if known {
                        errors.push(reject("unit already added"));
                        return false;
                    }
                    self.active.insert(id, iu.clone());
                    self.last_added = Some(iu.downgrade());
                }
                UpdateType::Revoke | UpdateType::Commit => {
                    if !known {
                        errors.push(reject("unit never added"));
                        return false;
                    }
                    let applied = if update == UpdateType::Revoke {
                        iu.revoke()
                    } else {
                        iu.commit()
                    };
                    if let Err(source) = applied {
                        errors.push(ModuleError::Transition {
                            module: module.clone(),
                            source,
                        });
                        return false;
                    }
                    if self.active.remove(&id).is_some() {
                        if update == UpdateType::Commit {
                            self.committed.insert(iu);
                        } else {
                            self.revoked.insert(iu);
                        }
                    }
                }
            }
            changed = true;
            true
        });
        changed
    }

    /// Reports every live output that grounds in a revoked unit, once per
    /// output. Committed outputs are checked for as long as someone holds
    /// them.
    pub(crate) fn validate_grounding(&mut self, module: &ModuleId, errors: &mut Vec<ModuleError>) {
        let committed: Vec<Iu> = self.committed.live().collect();
        for iu in self.active.values().chain(committed.iter()) {
            if self.flagged.contains(&iu.id()) {
                continue;
            }
            if let Some(revoked) = iu.revoked_grounding() {
                self.flagged.insert(iu.id());
                errors.push(ModuleError::GroundingViolation {
                    module: module.clone(),
                    id: iu.id(),
                    revoked: revoked.id(),
                });
            }
        }
        let (active, committed) = (&self.active, &self.committed);
        self.flagged
            .retain(|id| active.contains_key(id) || committed.contains(*id));
    }

    pub(crate) fn active(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.active.values()
    }

    pub(crate) fn last_added(&self) -> Option<&WeakIu> {
        self.last_added.as_ref()
    }

    /// Active outputs in creation order.
    pub(crate) fn snapshot(&self) -> Vec<Iu> {
        let mut units: Vec<Iu> = self.active.values().cloned().collect();
        units.sort_by_key(Iu::id);
        units
    }

    /// Revoked and committed ids still remembered.
    #[cfg(test)]
    pub(crate) fn retired_len(&self) -> usize {
        self.committed.len() + self.revoked.len()
    }
}

//! Network-owned index of every unit published by any module.
//!
//! Entries are weak: the registry never keeps a unit alive. Dead entries are
//! swept whenever the index outgrows twice its live size.

use std::collections::HashMap;

use iu::{Iu, IuId, WeakIu};
use parking_lot::RwLock;

const MIN_SWEEP: usize = 1024;

#[derive(Debug)]
pub struct IuRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    units: HashMap<IuId, WeakIu>,
    sweep_at: usize,
}

impl Default for IuRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IuRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                units: HashMap::new(),
                sweep_at: MIN_SWEEP,
            }),
        }
    }

    pub fn record(&self, iu: &Iu) {
        let mut inner = self.inner.write();
        inner.units.entry(iu.id()).or_insert_with(|| iu.downgrade());
        if inner.units.len() >= inner.sweep_at {
            inner.units.retain(|_, unit| unit.is_alive());
            inner.sweep_at = (inner.units.len() * 2).max(MIN_SWEEP);
        }
    }

    /// The unit with `id`, if it was published and is still alive.
    pub fn get(&self, id: IuId) -> Option<Iu> {
        self.inner.read().units.get(&id).and_then(WeakIu::upgrade)
    }

    /// Every published unit still alive, ordered by id.
    pub fn live(&self) -> Vec<Iu> {
        let mut units: Vec<Iu> = self
            .inner
            .read()
            .units
            .values()
            .filter_map(WeakIu::upgrade)
            .collect();
        units.sort_by_key(Iu::id);
        units
    }

    /// Number of published units still alive.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .units
            .values()
            .filter(|unit| unit.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

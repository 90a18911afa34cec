//! Incremental units and their status machine.
//!
//! An [`Iu`] is a cheap, clonable handle to a shared record. The payload,
//! creator and grounding are fixed when [`IuBuilder::build`] returns; the only
//! field that changes afterwards is the status, which moves from `Active` to
//! exactly one of the terminal states through a compare-and-set. Concurrent
//! revocations of the same unit therefore apply once and report
//! [`Transition::Unchanged`] to every other caller.
//!
//! Grounding links are weak: a unit never keeps the units it was derived from
//! alive, and because links can only be taken to units that already exist the
//! grounding graph is acyclic by construction.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{IuError, IuResult};
use crate::id::{IuId, ModuleId};
use crate::payload::{DynPayload, Payload, PayloadType};

/// Lifecycle status of a unit. `Revoked` and `Committed` are terminal.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IuStatus {
    Active = 0,
    Revoked = 1,
    Committed = 2,
}

impl IuStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => IuStatus::Active,
            1 => IuStatus::Revoked,
            _ => IuStatus::Committed,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, IuStatus::Active)
    }
}

/// Outcome of a successful status change request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The status moved out of `Active`.
    Applied,
    /// The unit already had the requested status; nothing changed.
    Unchanged,
}

/// Non-owning reference to a unit; remembers the id after the unit is gone.
#[derive(Clone)]
pub struct WeakIu {
    id: IuId,
    unit: Weak<IuInner>,
}

impl WeakIu {
    fn to(iu: &Iu) -> Self {
        Self {
            id: iu.id(),
            unit: Arc::downgrade(&iu.0),
        }
    }

    /// Link that only carries an id and never resolves, for units this
    /// process holds no handle to.
    pub fn dangling(id: IuId) -> Self {
        Self {
            id,
            unit: Weak::new(),
        }
    }

    pub fn id(&self) -> IuId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Iu> {
        self.unit.upgrade().map(Iu)
    }

    pub fn is_alive(&self) -> bool {
        self.unit.strong_count() > 0
    }
}

impl fmt::Debug for WeakIu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakIu({})", self.id)
    }
}

struct IuInner {
    id: IuId,
    creator: ModuleId,
    created_at: Instant,
    payload: Arc<dyn DynPayload>,
    grounded_in: SmallVec<[WeakIu; 2]>,
    previous: Option<WeakIu>,
    status: AtomicU8,
}

/// Shared handle to an incremental unit.
#[derive(Clone)]
pub struct Iu(Arc<IuInner>);

impl Iu {
    pub fn id(&self) -> IuId {
        self.0.id
    }

    pub fn creator(&self) -> &ModuleId {
        &self.0.creator
    }

    pub fn created_at(&self) -> Instant {
        self.0.created_at
    }

    pub fn age(&self) -> Duration {
        self.0.created_at.elapsed()
    }

    pub fn payload(&self) -> &dyn DynPayload {
        self.0.payload.as_ref()
    }

    pub fn payload_arc(&self) -> Arc<dyn DynPayload> {
        Arc::clone(&self.0.payload)
    }

    /// Typed view of the payload, `None` if it is a different type.
    pub fn payload_as<T: Payload>(&self) -> Option<&T> {
        self.0.payload.as_any().downcast_ref::<T>()
    }

    pub fn payload_type(&self) -> PayloadType {
        self.0.payload.payload_type()
    }

    /// Units this one was derived from that are still alive, in grounding order.
    pub fn grounded_in(&self) -> Vec<Iu> {
        self.0.grounded_in.iter().filter_map(WeakIu::upgrade).collect()
    }

    /// Ids of every grounding unit, including ones no longer alive.
    pub fn grounded_in_ids(&self) -> impl Iterator<Item = IuId> + '_ {
        self.0.grounded_in.iter().map(|link| link.id)
    }

    pub fn is_grounded_in(&self, id: IuId) -> bool {
        self.grounded_in_ids().any(|known| known == id)
    }

    /// Unit the same creator emitted right before this one, if still alive.
    pub fn previous(&self) -> Option<Iu> {
        self.0.previous.as_ref().and_then(WeakIu::upgrade)
    }

    pub fn previous_id(&self) -> Option<IuId> {
        self.0.previous.as_ref().map(|link| link.id)
    }

    pub fn status(&self) -> IuStatus {
        IuStatus::from_u8(self.0.status.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.status() == IuStatus::Active
    }

    pub fn is_revoked(&self) -> bool {
        self.status() == IuStatus::Revoked
    }

    pub fn is_committed(&self) -> bool {
        self.status() == IuStatus::Committed
    }

    /// `Active -> Revoked`. Revoking a revoked unit is a no-op; revoking a
    /// committed one fails.
    pub fn revoke(&self) -> IuResult<Transition> {
        self.transition(IuStatus::Revoked)
    }

    /// `Active -> Committed`. Committing a committed unit is a no-op;
    /// committing a revoked one fails.
    pub fn commit(&self) -> IuResult<Transition> {
        self.transition(IuStatus::Committed)
    }

    fn transition(&self, to: IuStatus) -> IuResult<Transition> {
        match self.0.status.compare_exchange(
            IuStatus::Active as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::trace!(iu = %self.id(), status = ?to, "status changed");
                Ok(Transition::Applied)
            }
            Err(raw) => {
                let from = IuStatus::from_u8(raw);
                if from == to {
                    Ok(Transition::Unchanged)
                } else {
                    Err(IuError::InvalidTransition {
                        id: self.id(),
                        from,
                        to,
                    })
                }
            }
        }
    }

    /// First live grounding unit that has been revoked, if any.
    pub fn revoked_grounding(&self) -> Option<Iu> {
        self.grounded_in().into_iter().find(Iu::is_revoked)
    }

    pub fn downgrade(&self) -> WeakIu {
        WeakIu::to(self)
    }

    pub fn ptr_eq(&self, other: &Iu) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Iu {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Iu {}

impl Hash for Iu {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Iu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iu")
            .field("id", &self.id())
            .field("creator", &self.creator().as_str())
            .field("status", &self.status())
            .field("payload", &self.0.payload)
            .finish()
    }
}

/// Assembles a unit before publication. The builder is the only place a
/// payload can be written.
pub struct IuBuilder {
    creator: ModuleId,
    payload: Arc<dyn DynPayload>,
    grounded_in: SmallVec<[WeakIu; 2]>,
    previous: Option<WeakIu>,
}

impl IuBuilder {
    pub fn new<P: Payload>(creator: ModuleId, payload: P) -> Self {
        Self::from_arc(creator, Arc::new(payload))
    }

    pub fn from_arc(creator: ModuleId, payload: Arc<dyn DynPayload>) -> Self {
        Self {
            creator,
            payload,
            grounded_in: SmallVec::new(),
            previous: None,
        }
    }

    /// Appends a grounding link; repeated links to the same unit are ignored.
    pub fn grounded_in(self, iu: &Iu) -> Self {
        self.grounded_in_link(WeakIu::to(iu))
    }

    /// Like [`IuBuilder::grounded_in`], from a link that may no longer (or
    /// never) resolve. The id is kept either way.
    pub fn grounded_in_link(mut self, link: WeakIu) -> Self {
        if !self.grounded_in.iter().any(|known| known.id == link.id) {
            self.grounded_in.push(link);
        }
        self
    }

    pub fn grounded_in_all<'a>(self, ius: impl IntoIterator<Item = &'a Iu>) -> Self {
        ius.into_iter().fold(self, IuBuilder::grounded_in)
    }

    pub fn previous(self, iu: &Iu) -> Self {
        self.previous_link(WeakIu::to(iu))
    }

    pub fn previous_link(mut self, link: WeakIu) -> Self {
        self.previous = Some(link);
        self
    }

    /// Publishes an `Active` unit with a fresh id.
    pub fn build(self) -> Iu {
        self.finish(Instant::now(), IuStatus::Active)
    }

    /// Rebuilds a unit received from another process: fresh local id, the
    /// sender's age and status preserved.
    pub fn build_mirror(self, age: Duration, status: IuStatus) -> Iu {
        let now = Instant::now();
        let created_at = now.checked_sub(age).unwrap_or(now);
        self.finish(created_at, status)
    }

    fn finish(self, created_at: Instant, status: IuStatus) -> Iu {
        Iu(Arc::new(IuInner {
            id: IuId::next(),
            creator: self.creator,
            created_at,
            payload: self.payload,
            grounded_in: self.grounded_in,
            previous: self.previous,
            status: AtomicU8::new(status as u8),
        }))
    }
}

use thiserror::Error;

use crate::id::IuId;
use crate::unit::IuStatus;

pub type IuResult<T> = Result<T, IuError>;

/// Errors raised by unit status changes and update-message construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IuError {
    /// Illegal status change, e.g. revoking a committed unit.
    #[error("invalid transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: IuId,
        from: IuStatus,
        to: IuStatus,
    },

    /// The same unit was placed into one update message twice.
    #[error("{id} already present in update message")]
    DuplicateIu { id: IuId },

    /// An ADD entry referenced a unit that is no longer active.
    #[error("cannot add {id}: status is {status:?}")]
    NotActive { id: IuId, status: IuStatus },
}

//! Serializable views of units and messages for taps and introspection.

use iu::{Iu, IuId, IuStatus, ModuleId, PayloadType, UpdateMessage, UpdateType};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitSummary {
    pub id: IuId,
    pub creator: ModuleId,
    pub payload_type: PayloadType,
    pub payload: String,
    pub status: IuStatus,
    pub age_micros: u64,
    pub grounded_in: Vec<IuId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<IuId>,
}

impl UnitSummary {
    pub fn of(iu: &Iu) -> Self {
        Self {
            id: iu.id(),
            creator: iu.creator().clone(),
            payload_type: iu.payload_type(),
            payload: format!("{:?}", iu.payload()),
            status: iu.status(),
            age_micros: u64::try_from(iu.age().as_micros()).unwrap_or(u64::MAX),
            grounded_in: iu.grounded_in_ids().collect(),
            previous: iu.previous_id(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntrySummary {
    pub update: UpdateType,
    pub unit: UnitSummary,
}

pub fn summarize(message: &UpdateMessage) -> Vec<EntrySummary> {
    message
        .iter()
        .map(|(iu, update)| EntrySummary {
            update,
            unit: UnitSummary::of(iu),
        })
        .collect()
}

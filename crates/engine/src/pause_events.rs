//! Append-only audit log of pause and resume transitions.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseEventKind {
    Pause,
    Resume,
}

impl PauseEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

impl TryFrom<&str> for PauseEventKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            other => Err(EngineError::InvalidInput(format!(
                "invalid pause event kind: {other}"
            ))),
        }
    }
}

/// One pause or resume of a bulk allocation, with the count it happened at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEvent {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub kind: PauseEventKind,
    /// Only set for pauses.
    pub reason: Option<String>,
    pub remaining: i64,
    pub occurred_at: DateTime<Utc>,
}

impl PauseEvent {
    pub(crate) fn pause(
        allocation_id: Uuid,
        reason: String,
        remaining: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            allocation_id,
            kind: PauseEventKind::Pause,
            reason: Some(reason),
            remaining,
            occurred_at,
        }
    }

    pub(crate) fn resume(allocation_id: Uuid, remaining: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            allocation_id,
            kind: PauseEventKind::Resume,
            reason: None,
            remaining,
            occurred_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pause_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub allocation_id: String,
    pub kind: String,
    pub reason: Option<String>,
    pub remaining: i64,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::allocations::Entity",
        from = "Column::AllocationId",
        to = "super::allocations::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Allocations,
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PauseEvent> for ActiveModel {
    fn from(event: &PauseEvent) -> Self {
        Self {
            id: ActiveValue::Set(event.id.to_string()),
            allocation_id: ActiveValue::Set(event.allocation_id.to_string()),
            kind: ActiveValue::Set(event.kind.as_str().to_string()),
            reason: ActiveValue::Set(event.reason.clone()),
            remaining: ActiveValue::Set(event.remaining),
            occurred_at: ActiveValue::Set(event.occurred_at),
        }
    }
}

impl TryFrom<Model> for PauseEvent {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "pause event")?,
            allocation_id: parse_uuid(&model.allocation_id, "allocation")?,
            kind: PauseEventKind::try_from(model.kind.as_str())?,
            reason: model.reason,
            remaining: model.remaining,
            occurred_at: model.occurred_at,
        })
    }
}

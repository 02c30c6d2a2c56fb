//! Celebration primitives.
//!
//! A `CelebrationEvent` is the immutable record of one recorded celebration.
//! Bulk celebrations carry the serial number drawn from their allocation;
//! personal celebrations point at the monthly obligation they were counted
//! against.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CelebrationKind {
    Personal,
    Bulk,
    FixedDate,
    Special,
}

impl CelebrationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Bulk => "bulk",
            Self::FixedDate => "fixed_date",
            Self::Special => "special",
        }
    }

    /// Interrupting kinds suspend the owner's running bulk allocations.
    pub fn is_interrupting(self) -> bool {
        !matches!(self, Self::Bulk)
    }

    /// Kinds whose events back a counter and therefore cannot be deleted.
    pub fn is_counted(self) -> bool {
        matches!(self, Self::Personal | Self::Bulk)
    }
}

impl TryFrom<&str> for CelebrationKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "personal" => Ok(Self::Personal),
            "bulk" => Ok(Self::Bulk),
            "fixed_date" => Ok(Self::FixedDate),
            "special" => Ok(Self::Special),
            other => Err(EngineError::InvalidInput(format!(
                "invalid celebration kind: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for CelebrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelebrationEvent {
    pub id: Uuid,
    pub owner_id: String,
    pub celebrated_on: NaiveDate,
    pub kind: CelebrationKind,
    pub allocation_id: Option<Uuid>,
    pub obligation_id: Option<Uuid>,
    /// `remaining` of the allocation before this celebration (bulk only).
    pub serial_number: Option<i64>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CelebrationEvent {
    pub(crate) fn new(
        owner_id: String,
        celebrated_on: NaiveDate,
        kind: CelebrationKind,
        notes: Option<String>,
        location: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            celebrated_on,
            kind,
            allocation_id: None,
            obligation_id: None,
            serial_number: None,
            notes,
            location,
            created_at,
        }
    }

    pub(crate) fn drawn_from(mut self, allocation_id: Uuid, serial_number: i64) -> Self {
        self.allocation_id = Some(allocation_id);
        self.serial_number = Some(serial_number);
        self
    }

    pub(crate) fn counted_against(mut self, obligation_id: Uuid) -> Self {
        self.obligation_id = Some(obligation_id);
        self
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "celebrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub celebrated_on: Date,
    pub kind: String,
    pub allocation_id: Option<String>,
    pub obligation_id: Option<String>,
    pub serial_number: Option<i64>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::allocations::Entity",
        from = "Column::AllocationId",
        to = "super::allocations::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Allocations,
    #[sea_orm(
        belongs_to = "super::obligations::Entity",
        from = "Column::ObligationId",
        to = "super::obligations::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Obligations,
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::obligations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Obligations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CelebrationEvent> for ActiveModel {
    fn from(event: &CelebrationEvent) -> Self {
        Self {
            id: ActiveValue::Set(event.id.to_string()),
            owner_id: ActiveValue::Set(event.owner_id.clone()),
            celebrated_on: ActiveValue::Set(event.celebrated_on),
            kind: ActiveValue::Set(event.kind.as_str().to_string()),
            allocation_id: ActiveValue::Set(event.allocation_id.map(|id| id.to_string())),
            obligation_id: ActiveValue::Set(event.obligation_id.map(|id| id.to_string())),
            serial_number: ActiveValue::Set(event.serial_number),
            notes: ActiveValue::Set(event.notes.clone()),
            location: ActiveValue::Set(event.location.clone()),
            created_at: ActiveValue::Set(event.created_at),
        }
    }
}

impl TryFrom<Model> for CelebrationEvent {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "celebration")?,
            owner_id: model.owner_id,
            celebrated_on: model.celebrated_on,
            kind: CelebrationKind::try_from(model.kind.as_str())?,
            allocation_id: model
                .allocation_id
                .as_deref()
                .map(|id| parse_uuid(id, "allocation"))
                .transpose()?,
            obligation_id: model
                .obligation_id
                .as_deref()
                .map(|id| parse_uuid(id, "monthly obligation"))
                .transpose()?,
            serial_number: model.serial_number,
            notes: model.notes,
            location: model.location,
            created_at: model.created_at,
        })
    }
}

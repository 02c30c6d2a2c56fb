//! Monthly personal obligations.
//!
//! One row per (owner, year, month), created lazily by the first personal
//! celebration of the period. The counter only grows and is capped by
//! `target`; a new period starts from zero with no carry-over.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{non_negative, parse_uuid},
};

/// Default number of personal celebrations per month.
pub const DEFAULT_MONTHLY_TARGET: i64 = 3;

/// A calendar month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> ResultEngine<Self> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidInput(format!(
                "month must be within 1..=12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        self.next().first_day().and_then(|d| d.pred_opt())
    }

    /// Months since year zero, handy for ordering comparisons.
    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }

    pub fn is_before(self, other: Period) -> bool {
        self.index() < other.index()
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyObligation {
    pub id: Uuid,
    pub owner_id: String,
    pub period: Period,
    pub completed: i64,
    pub target: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyObligation {
    pub fn new(owner_id: String, period: Period, target: i64, now: DateTime<Utc>) -> ResultEngine<Self> {
        if target <= 0 {
            return Err(EngineError::InvalidInput(
                "monthly target must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id,
            period,
            completed: 0,
            target,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_saturated(&self) -> bool {
        self.completed >= self.target
    }

    pub fn remaining(&self) -> i64 {
        (self.target - self.completed).max(0)
    }

    /// Count one personal celebration against the period.
    pub fn record(&mut self, now: DateTime<Utc>) -> ResultEngine<()> {
        if self.is_saturated() {
            return Err(EngineError::MonthlyLimitReached(format!(
                "{} {}",
                self.owner_id, self.period
            )));
        }
        self.completed += 1;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "monthly_obligations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub year: i32,
    pub month: i32,
    pub completed: i64,
    pub target: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::owners::Entity",
        from = "Column::OwnerId",
        to = "super::owners::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Owners,
    #[sea_orm(has_many = "super::celebrations::Entity")]
    Celebrations,
}

impl Related<super::owners::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owners.def()
    }
}

impl Related<super::celebrations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Celebrations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&MonthlyObligation> for ActiveModel {
    fn from(obligation: &MonthlyObligation) -> Self {
        Self {
            id: ActiveValue::Set(obligation.id.to_string()),
            owner_id: ActiveValue::Set(obligation.owner_id.clone()),
            year: ActiveValue::Set(obligation.period.year),
            month: ActiveValue::Set(obligation.period.month as i32),
            completed: ActiveValue::Set(obligation.completed),
            target: ActiveValue::Set(obligation.target),
            created_at: ActiveValue::Set(obligation.created_at),
            updated_at: ActiveValue::Set(obligation.updated_at),
        }
    }
}

impl TryFrom<Model> for MonthlyObligation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let month = u32::try_from(model.month)
            .map_err(|_| EngineError::InvalidInput(format!("invalid month: {}", model.month)))?;
        let obligation = Self {
            id: parse_uuid(&model.id, "monthly obligation")?,
            owner_id: model.owner_id,
            period: Period::new(model.year, month)?,
            completed: non_negative(model.completed, "completed")?,
            target: model.target,
            created_at: model.created_at,
            updated_at: model.updated_at,
        };
        if obligation.completed > obligation.target {
            return Err(EngineError::InvalidInput(format!(
                "corrupted monthly obligation {}: completed exceeds target",
                obligation.id
            )));
        }
        Ok(obligation)
    }
}

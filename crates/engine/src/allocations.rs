//! The module contains the representation of a bulk allocation.
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, PauseEvent, ResultEngine,
    util::{non_negative, normalize_required, parse_uuid},
};

/// Lifecycle of a bulk allocation.
///
/// `Completed` is terminal: once `remaining` reaches zero no transition is
/// accepted anymore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    Active,
    Paused,
    Completed,
}

impl AllocationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

/// Pause bookkeeping. Present exactly when the allocation is paused, so the
/// reason and the timestamp can never be set independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pause {
    pub reason: String,
    pub paused_at: DateTime<Utc>,
    pub count_at_pause: i64,
    /// Set by an interrupting celebration rather than by hand. Only these
    /// pauses are lifted automatically.
    pub automatic: bool,
}

/// A bulk allocation.
///
/// A fixed pool of `total` celebrations counted down one at a time. Every
/// accepted celebration takes the current `remaining` value as its serial
/// number and then decrements it, so the serial numbers of an allocation are
/// `total, total - 1, ..., 1`.
///
/// The invariant $total = remaining + completed$ holds at every committed
/// state. Transitions validate before mutating: a rejected call leaves the
/// value untouched.
///
/// ** Examples
///
/// An allocation of 30 paused at 12 remaining keeps 12 until resumed, and the
/// next celebration after the resume gets serial number 12.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAllocation {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub total: i64,
    pub remaining: i64,
    pub completed: i64,
    pub pause: Option<Pause>,
    /// `remaining` at the most recent resume.
    pub resume_count: Option<i64>,
    pub start_date: NaiveDate,
    pub completed_on: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Optimistic concurrency token, bumped on every persisted transition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkAllocation {
    pub fn new(
        owner_id: String,
        title: String,
        total: i64,
        start_date: NaiveDate,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if total <= 0 {
            return Err(EngineError::InvalidInput(
                "total must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id,
            title,
            total,
            remaining: total,
            completed: 0,
            pause: None,
            resume_count: None,
            start_date,
            completed_on: None,
            notes,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn state(&self) -> AllocationState {
        if self.remaining == 0 {
            AllocationState::Completed
        } else if self.pause.is_some() {
            AllocationState::Paused
        } else {
            AllocationState::Active
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_some()
    }

    pub fn pause_reason(&self) -> Option<&str> {
        self.pause.as_ref().map(|p| p.reason.as_str())
    }

    /// Take one celebration from the pool and return its serial number.
    pub fn celebrate(&mut self, on: NaiveDate, now: DateTime<Utc>) -> ResultEngine<i64> {
        match self.state() {
            AllocationState::Completed => {
                return Err(EngineError::AllocationExhausted(self.id.to_string()));
            }
            AllocationState::Paused => {
                return Err(EngineError::AllocationPaused(self.id.to_string()));
            }
            AllocationState::Active => {}
        }

        let serial_number = self.remaining;
        self.remaining -= 1;
        self.completed += 1;
        if self.remaining == 0 {
            self.completed_on = Some(on);
        }
        self.updated_at = now;
        Ok(serial_number)
    }

    pub fn pause(&mut self, reason: &str, at: DateTime<Utc>) -> ResultEngine<PauseEvent> {
        self.pause_with(reason, false, at)
    }

    /// Pause on behalf of an interrupting celebration.
    pub fn interrupt(&mut self, reason: &str, at: DateTime<Utc>) -> ResultEngine<PauseEvent> {
        self.pause_with(reason, true, at)
    }

    fn pause_with(
        &mut self,
        reason: &str,
        automatic: bool,
        at: DateTime<Utc>,
    ) -> ResultEngine<PauseEvent> {
        let reason = normalize_required(reason, "pause reason")?;
        match self.state() {
            AllocationState::Completed => {
                return Err(EngineError::AllocationExhausted(self.id.to_string()));
            }
            AllocationState::Paused => {
                return Err(EngineError::AlreadyPaused(self.id.to_string()));
            }
            AllocationState::Active => {}
        }

        self.pause = Some(Pause {
            reason: reason.clone(),
            paused_at: at,
            count_at_pause: self.remaining,
            automatic,
        });
        self.updated_at = at;
        Ok(PauseEvent::pause(self.id, reason, self.remaining, at))
    }

    pub fn resume(&mut self, at: DateTime<Utc>) -> ResultEngine<PauseEvent> {
        let Some(pause) = self.pause.take() else {
            return Err(EngineError::NotPaused(self.id.to_string()));
        };
        // Nothing can move the counter while paused.
        debug_assert_eq!(pause.count_at_pause, self.remaining);

        self.resume_count = Some(self.remaining);
        self.updated_at = at;
        Ok(PauseEvent::resume(self.id, self.remaining, at))
    }

    fn check_invariants(&self) -> ResultEngine<()> {
        let corrupted = |what: &str| {
            EngineError::InvalidInput(format!("corrupted allocation {}: {what}", self.id))
        };
        if self.total <= 0 {
            return Err(corrupted("total must be > 0"));
        }
        if self.total != self.remaining + self.completed {
            return Err(corrupted("total != remaining + completed"));
        }
        if self.remaining == 0 && self.pause.is_some() {
            return Err(corrupted("completed allocation is paused"));
        }
        if self
            .pause
            .as_ref()
            .is_some_and(|p| p.count_at_pause != self.remaining)
        {
            return Err(corrupted("remaining moved while paused"));
        }
        Ok(())
    }

    /// Columns touched by a state transition, with the bumped version.
    pub(crate) fn transition_model(&self) -> ActiveModel {
        let pause = self.pause.as_ref();
        ActiveModel {
            remaining: ActiveValue::Set(self.remaining),
            completed: ActiveValue::Set(self.completed),
            paused: ActiveValue::Set(pause.is_some()),
            pause_reason: ActiveValue::Set(pause.map(|p| p.reason.clone())),
            paused_at: ActiveValue::Set(pause.map(|p| p.paused_at)),
            count_at_pause: ActiveValue::Set(pause.map(|p| p.count_at_pause)),
            pause_automatic: ActiveValue::Set(pause.is_some_and(|p| p.automatic)),
            resume_count: ActiveValue::Set(self.resume_count),
            completed_on: ActiveValue::Set(self.completed_on),
            version: ActiveValue::Set(self.version + 1),
            updated_at: ActiveValue::Set(self.updated_at),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "bulk_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub total: i64,
    pub remaining: i64,
    pub completed: i64,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub paused_at: Option<DateTimeUtc>,
    pub count_at_pause: Option<i64>,
    pub pause_automatic: bool,
    pub resume_count: Option<i64>,
    pub start_date: Date,
    pub completed_on: Option<Date>,
    pub notes: Option<String>,
    pub version: i64,
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
    #[sea_orm(has_many = "super::pause_events::Entity")]
    PauseEvents,
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

impl Related<super::pause_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PauseEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BulkAllocation> for ActiveModel {
    fn from(allocation: &BulkAllocation) -> Self {
        let pause = allocation.pause.as_ref();
        Self {
            id: ActiveValue::Set(allocation.id.to_string()),
            owner_id: ActiveValue::Set(allocation.owner_id.clone()),
            title: ActiveValue::Set(allocation.title.clone()),
            total: ActiveValue::Set(allocation.total),
            remaining: ActiveValue::Set(allocation.remaining),
            completed: ActiveValue::Set(allocation.completed),
            paused: ActiveValue::Set(pause.is_some()),
            pause_reason: ActiveValue::Set(pause.map(|p| p.reason.clone())),
            paused_at: ActiveValue::Set(pause.map(|p| p.paused_at)),
            count_at_pause: ActiveValue::Set(pause.map(|p| p.count_at_pause)),
            pause_automatic: ActiveValue::Set(pause.is_some_and(|p| p.automatic)),
            resume_count: ActiveValue::Set(allocation.resume_count),
            start_date: ActiveValue::Set(allocation.start_date),
            completed_on: ActiveValue::Set(allocation.completed_on),
            notes: ActiveValue::Set(allocation.notes.clone()),
            version: ActiveValue::Set(allocation.version),
            created_at: ActiveValue::Set(allocation.created_at),
            updated_at: ActiveValue::Set(allocation.updated_at),
        }
    }
}

impl TryFrom<Model> for BulkAllocation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let id = parse_uuid(&model.id, "allocation")?;
        let pause = match (
            model.paused,
            model.pause_reason,
            model.paused_at,
            model.count_at_pause,
        ) {
            (true, Some(reason), Some(paused_at), Some(count_at_pause)) => Some(Pause {
                reason,
                paused_at,
                count_at_pause,
                automatic: model.pause_automatic,
            }),
            (false, None, None, None) if !model.pause_automatic => None,
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "corrupted allocation {id}: pause fields out of sync"
                )));
            }
        };

        let allocation = Self {
            id,
            owner_id: model.owner_id,
            title: model.title,
            total: model.total,
            remaining: non_negative(model.remaining, "remaining")?,
            completed: non_negative(model.completed, "completed")?,
            pause,
            resume_count: model.resume_count,
            start_date: model.start_date,
            completed_on: model.completed_on,
            notes: model.notes,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        };
        allocation.check_invariants()?;
        Ok(allocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PauseEventKind;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()
    }

    fn allocation(total: i64) -> BulkAllocation {
        BulkAllocation::new(
            "alice".to_string(),
            "Province".to_string(),
            total,
            today(),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn countdown_serials() {
        let mut alloc = allocation(5);
        let serials: Vec<i64> = (0..5)
            .map(|_| alloc.celebrate(today(), Utc::now()).unwrap())
            .collect();

        assert_eq!(serials, vec![5, 4, 3, 2, 1]);
        assert_eq!(alloc.state(), AllocationState::Completed);
        assert_eq!(alloc.completed_on, Some(today()));
        assert_eq!(alloc.total, alloc.remaining + alloc.completed);

        let err = alloc.celebrate(today(), Utc::now()).unwrap_err();
        assert_eq!(err, EngineError::AllocationExhausted(alloc.id.to_string()));
        assert_eq!(alloc.remaining, 0);
    }

    #[test]
    fn pause_preserves_count() {
        let mut alloc = allocation(50);
        for _ in 0..3 {
            alloc.celebrate(today(), Utc::now()).unwrap();
        }
        assert_eq!(alloc.remaining, 47);

        let event = alloc.pause("retreat", Utc::now()).unwrap();
        assert_eq!(event.kind, PauseEventKind::Pause);
        assert_eq!(event.remaining, 47);
        assert_eq!(alloc.state(), AllocationState::Paused);
        assert_eq!(alloc.pause.as_ref().unwrap().count_at_pause, 47);

        let err = alloc.celebrate(today(), Utc::now()).unwrap_err();
        assert_eq!(err, EngineError::AllocationPaused(alloc.id.to_string()));

        let event = alloc.resume(Utc::now()).unwrap();
        assert_eq!(event.kind, PauseEventKind::Resume);
        assert_eq!(event.remaining, 47);
        assert_eq!(alloc.remaining, 47);
        assert_eq!(alloc.resume_count, Some(47));
        assert_eq!(alloc.celebrate(today(), Utc::now()).unwrap(), 47);
    }

    #[test]
    fn double_pause_and_stray_resume() {
        let mut alloc = allocation(3);
        let err = alloc.resume(Utc::now()).unwrap_err();
        assert_eq!(err, EngineError::NotPaused(alloc.id.to_string()));

        alloc.pause("sick leave", Utc::now()).unwrap();
        let err = alloc.pause("again", Utc::now()).unwrap_err();
        assert_eq!(err, EngineError::AlreadyPaused(alloc.id.to_string()));
        assert_eq!(alloc.pause_reason(), Some("sick leave"));
    }

    #[test]
    fn blank_reason_rejected() {
        let mut alloc = allocation(3);
        assert!(matches!(
            alloc.pause("   ", Utc::now()),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(!alloc.is_paused());
    }

    #[test]
    fn completed_cannot_pause() {
        let mut alloc = allocation(1);
        alloc.celebrate(today(), Utc::now()).unwrap();
        let err = alloc.pause("late", Utc::now()).unwrap_err();
        assert_eq!(err, EngineError::AllocationExhausted(alloc.id.to_string()));
    }

    #[test]
    fn zero_total_rejected() {
        assert!(matches!(
            BulkAllocation::new("a".into(), "t".into(), 0, today(), None, Utc::now()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn model_with_half_pause_is_rejected() {
        let alloc = allocation(10);
        let mut model = Model {
            id: alloc.id.to_string(),
            owner_id: alloc.owner_id.clone(),
            title: alloc.title.clone(),
            total: 10,
            remaining: 10,
            completed: 0,
            paused: true,
            pause_reason: Some("retreat".to_string()),
            paused_at: None,
            count_at_pause: Some(10),
            pause_automatic: false,
            resume_count: None,
            start_date: today(),
            completed_on: None,
            notes: None,
            version: 0,
            created_at: alloc.created_at,
            updated_at: alloc.updated_at,
        };
        assert!(BulkAllocation::try_from(model.clone()).is_err());

        model.paused_at = Some(Utc::now());
        let restored = BulkAllocation::try_from(model.clone()).unwrap();
        assert_eq!(restored.state(), AllocationState::Paused);

        model.count_at_pause = None;
        assert!(BulkAllocation::try_from(model.clone()).is_err());
        model.count_at_pause = Some(10);

        model.completed = 3;
        assert!(BulkAllocation::try_from(model).is_err());
    }

    #[test]
    fn interruption_marks_pause_automatic() {
        let mut manual = allocation(10);
        manual.pause("personal", Utc::now()).unwrap();
        assert!(!manual.pause.as_ref().unwrap().automatic);

        let mut interrupted = allocation(10);
        interrupted.interrupt("personal", Utc::now()).unwrap();
        assert!(interrupted.pause.as_ref().unwrap().automatic);
        assert_eq!(interrupted.pause_reason(), Some("personal"));

        interrupted.resume(Utc::now()).unwrap();
        assert!(matches!(
            interrupted.transition_model().pause_automatic,
            ActiveValue::Set(false)
        ));
    }
}

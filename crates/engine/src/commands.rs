//! Command structs for engine operations.
//!
//! These types group parameters for write operations (record a celebration,
//! open an allocation), keeping call sites readable and avoiding long
//! argument lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::CelebrationKind;

/// Record one celebration.
#[derive(Clone, Debug)]
pub struct RecordCelebrationCmd {
    pub owner_id: String,
    pub celebrated_on: NaiveDate,
    pub kind: CelebrationKind,
    /// Required for `bulk`, rejected for every other kind.
    pub allocation_id: Option<Uuid>,
    pub notes: Option<String>,
    pub location: Option<String>,
}

impl RecordCelebrationCmd {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, celebrated_on: NaiveDate, kind: CelebrationKind) -> Self {
        Self {
            owner_id: owner_id.into(),
            celebrated_on,
            kind,
            allocation_id: None,
            notes: None,
            location: None,
        }
    }

    #[must_use]
    pub fn personal(owner_id: impl Into<String>, celebrated_on: NaiveDate) -> Self {
        Self::new(owner_id, celebrated_on, CelebrationKind::Personal)
    }

    #[must_use]
    pub fn bulk(owner_id: impl Into<String>, celebrated_on: NaiveDate, allocation_id: Uuid) -> Self {
        Self::new(owner_id, celebrated_on, CelebrationKind::Bulk).allocation_id(allocation_id)
    }

    #[must_use]
    pub fn allocation_id(mut self, allocation_id: Uuid) -> Self {
        self.allocation_id = Some(allocation_id);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Open a new bulk allocation.
#[derive(Clone, Debug)]
pub struct NewAllocationCmd {
    pub owner_id: String,
    pub title: String,
    pub total: i64,
    pub start_date: NaiveDate,
    pub notes: Option<String>,
}

impl NewAllocationCmd {
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        total: i64,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            total,
            start_date,
            notes: None,
        }
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Filters for [`Engine::list_allocations`](crate::Engine::list_allocations).
#[derive(Clone, Debug, Default)]
pub struct AllocationFilter {
    pub state: Option<crate::AllocationState>,
    /// Keep only allocations paused for this reason.
    pub pause_reason: Option<String>,
}

impl AllocationFilter {
    #[must_use]
    pub fn state(mut self, state: crate::AllocationState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn pause_reason(mut self, reason: impl Into<String>) -> Self {
        self.pause_reason = Some(reason.into());
        self
    }
}

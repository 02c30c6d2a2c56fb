use chrono::{Duration, NaiveDate};
use sea_orm::{PaginatorTrait, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    AllocationProgress, BulkAllocation, EngineError, PauseEvent, ResultEngine, allocations,
    celebrations, pause_events,
};

use super::Engine;

impl Engine {
    /// Percentage, status level and completion estimate of one allocation,
    /// computed as of `as_of`. Reads only.
    pub async fn allocation_progress(
        &self,
        owner_id: &str,
        allocation_id: Uuid,
        as_of: NaiveDate,
    ) -> ResultEngine<AllocationProgress> {
        let allocation = self
            .require_allocation(&self.database, owner_id, allocation_id)
            .await?;

        let window = i64::from(self.projection.estimate_window_days);
        let window_start = as_of
            .checked_sub_signed(Duration::days(window))
            .ok_or_else(|| EngineError::InvalidInput(format!("invalid as_of date {as_of}")))?;
        let recent = celebrations::Entity::find()
            .filter(celebrations::Column::AllocationId.eq(allocation_id.to_string()))
            .filter(celebrations::Column::CelebratedOn.gt(window_start))
            .filter(celebrations::Column::CelebratedOn.lte(as_of))
            .count(&self.database)
            .await?;

        Ok(AllocationProgress::new(
            allocation,
            recent,
            &self.projection,
            as_of,
        ))
    }

    /// Unfinished allocations with at most `threshold` celebrations left,
    /// nearest to completion first.
    pub async fn list_low_allocations(
        &self,
        owner_id: &str,
        threshold: i64,
    ) -> ResultEngine<Vec<BulkAllocation>> {
        self.require_owner(&self.database, owner_id).await?;
        let models = allocations::Entity::find()
            .filter(allocations::Column::OwnerId.eq(owner_id.to_string()))
            .filter(allocations::Column::Remaining.gt(0))
            .filter(allocations::Column::Remaining.lte(threshold))
            .order_by_asc(allocations::Column::Remaining)
            .order_by_asc(allocations::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(BulkAllocation::try_from).collect()
    }

    pub async fn pause_history(
        &self,
        owner_id: &str,
        allocation_id: Uuid,
    ) -> ResultEngine<Vec<PauseEvent>> {
        self.require_allocation(&self.database, owner_id, allocation_id)
            .await?;
        let models = pause_events::Entity::find()
            .filter(pause_events::Column::AllocationId.eq(allocation_id.to_string()))
            .order_by_asc(pause_events::Column::OccurredAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(PauseEvent::try_from).collect()
    }
}

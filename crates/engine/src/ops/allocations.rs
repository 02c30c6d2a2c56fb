use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    AllocationFilter, AllocationState, BulkAllocation, EngineError, NewAllocationCmd, PauseEvent,
    ResultEngine, allocations, pause_events,
    util::{normalize_optional_text, normalize_required},
};

use super::{Engine, with_tx};

impl Engine {
    /// Open a new bulk allocation with `remaining = total`.
    pub async fn new_allocation(&self, cmd: NewAllocationCmd) -> ResultEngine<BulkAllocation> {
        let title = normalize_required(&cmd.title, "allocation title")?;
        let allocation = BulkAllocation::new(
            cmd.owner_id.clone(),
            title,
            cmd.total,
            cmd.start_date,
            normalize_optional_text(cmd.notes.as_deref()),
            Utc::now(),
        )?;

        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, &cmd.owner_id).await?;
            allocations::ActiveModel::from(&allocation)
                .insert(&db_tx)
                .await?;
            tracing::info!(
                owner_id = %allocation.owner_id,
                allocation_id = %allocation.id,
                total = allocation.total,
                "allocation opened"
            );
            Ok(allocation)
        })
    }

    pub async fn allocation(
        &self,
        owner_id: &str,
        allocation_id: Uuid,
    ) -> ResultEngine<BulkAllocation> {
        self.require_allocation(&self.database, owner_id, allocation_id)
            .await
    }

    /// Suspend an active allocation, freezing `remaining` until resumed.
    pub async fn pause_allocation(
        &self,
        allocation_id: Uuid,
        reason: &str,
    ) -> ResultEngine<BulkAllocation> {
        self.with_retry("pause_allocation", || self.pause_once(allocation_id, reason))
            .await
    }

    async fn pause_once(&self, allocation_id: Uuid, reason: &str) -> ResultEngine<BulkAllocation> {
        with_tx!(self, |db_tx| {
            let mut allocation = self.require_allocation_by_id(&db_tx, allocation_id).await?;
            let event = allocation.pause(reason, Utc::now())?;
            self.persist_allocation(&db_tx, &mut allocation).await?;
            self.append_pause_event(&db_tx, &event).await?;
            tracing::info!(%allocation_id, reason, remaining = allocation.remaining, "allocation paused");
            Ok(allocation)
        })
    }

    pub async fn resume_allocation(&self, allocation_id: Uuid) -> ResultEngine<BulkAllocation> {
        self.with_retry("resume_allocation", || self.resume_once(allocation_id))
            .await
    }

    async fn resume_once(&self, allocation_id: Uuid) -> ResultEngine<BulkAllocation> {
        with_tx!(self, |db_tx| {
            let mut allocation = self.require_allocation_by_id(&db_tx, allocation_id).await?;
            let event = allocation.resume(Utc::now())?;
            self.persist_allocation(&db_tx, &mut allocation).await?;
            self.append_pause_event(&db_tx, &event).await?;
            tracing::info!(%allocation_id, remaining = allocation.remaining, "allocation resumed");
            Ok(allocation)
        })
    }

    /// Resume every allocation of `owner_id` paused for `reason`, whether an
    /// interruption or a caller paused it.
    ///
    /// Returns the ids of the resumed allocations; none paused is not an
    /// error.
    pub async fn resume_interrupted(&self, owner_id: &str, reason: &str) -> ResultEngine<Vec<Uuid>> {
        let reason = normalize_required(reason, "pause reason")?;
        self.with_retry("resume_interrupted", || {
            self.resume_interrupted_once(owner_id, &reason)
        })
        .await
    }

    async fn resume_interrupted_once(&self, owner_id: &str, reason: &str) -> ResultEngine<Vec<Uuid>> {
        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, owner_id).await?;
            self.resume_paused_for(&db_tx, owner_id, reason, false, Utc::now())
                .await
        })
    }

    pub async fn list_allocations(
        &self,
        owner_id: &str,
        filter: AllocationFilter,
    ) -> ResultEngine<Vec<BulkAllocation>> {
        self.require_owner(&self.database, owner_id).await?;

        let mut query = allocations::Entity::find()
            .filter(allocations::Column::OwnerId.eq(owner_id.to_string()));
        query = match filter.state {
            Some(AllocationState::Completed) => query.filter(allocations::Column::Remaining.eq(0)),
            Some(AllocationState::Paused) => query
                .filter(allocations::Column::Remaining.gt(0))
                .filter(allocations::Column::Paused.eq(true)),
            Some(AllocationState::Active) => query
                .filter(allocations::Column::Remaining.gt(0))
                .filter(allocations::Column::Paused.eq(false)),
            None => query,
        };
        if let Some(reason) = filter.pause_reason {
            query = query.filter(allocations::Column::PauseReason.eq(reason));
        }

        let models = query
            .order_by_asc(allocations::Column::CreatedAt)
            .order_by_asc(allocations::Column::Id)
            .all(&self.database)
            .await?;
        models.into_iter().map(BulkAllocation::try_from).collect()
    }

    /// Pause every active allocation of the owner. Runs inside the caller's
    /// transaction.
    pub(super) async fn pause_active_for<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> ResultEngine<Vec<Uuid>> {
        let models = allocations::Entity::find()
            .filter(allocations::Column::OwnerId.eq(owner_id.to_string()))
            .filter(allocations::Column::Paused.eq(false))
            .filter(allocations::Column::Remaining.gt(0))
            .order_by_asc(allocations::Column::CreatedAt)
            .all(db)
            .await?;

        let mut paused = Vec::with_capacity(models.len());
        for model in models {
            let mut allocation = BulkAllocation::try_from(model)?;
            let event = allocation.interrupt(reason, at)?;
            self.persist_allocation(db, &mut allocation).await?;
            self.append_pause_event(db, &event).await?;
            paused.push(allocation.id);
        }
        Ok(paused)
    }

    /// Resume every allocation of the owner paused for `reason`, or only the
    /// ones an interruption paused when `automatic_only`. Runs inside the
    /// caller's transaction.
    pub(super) async fn resume_paused_for<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: &str,
        reason: &str,
        automatic_only: bool,
        at: DateTime<Utc>,
    ) -> ResultEngine<Vec<Uuid>> {
        let mut query = allocations::Entity::find()
            .filter(allocations::Column::OwnerId.eq(owner_id.to_string()))
            .filter(allocations::Column::Paused.eq(true))
            .filter(allocations::Column::PauseReason.eq(reason.to_string()));
        if automatic_only {
            query = query.filter(allocations::Column::PauseAutomatic.eq(true));
        }
        let models = query
            .order_by_asc(allocations::Column::CreatedAt)
            .all(db)
            .await?;

        let mut resumed = Vec::with_capacity(models.len());
        for model in models {
            let mut allocation = BulkAllocation::try_from(model)?;
            let event = allocation.resume(at)?;
            self.persist_allocation(db, &mut allocation).await?;
            self.append_pause_event(db, &event).await?;
            resumed.push(allocation.id);
        }
        if !resumed.is_empty() {
            tracing::info!(owner_id, reason, count = resumed.len(), "allocations resumed");
        }
        Ok(resumed)
    }

    /// Compare-and-swap write of a transition. A row whose version moved
    /// since it was read is a `Conflict`.
    pub(super) async fn persist_allocation<C: ConnectionTrait>(
        &self,
        db: &C,
        allocation: &mut BulkAllocation,
    ) -> ResultEngine<()> {
        let result = allocations::Entity::update_many()
            .set(allocation.transition_model())
            .filter(allocations::Column::Id.eq(allocation.id.to_string()))
            .filter(allocations::Column::Version.eq(allocation.version))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::Conflict(format!(
                "allocation {} was modified concurrently",
                allocation.id
            )));
        }
        allocation.version += 1;
        Ok(())
    }

    pub(super) async fn append_pause_event<C: ConnectionTrait>(
        &self,
        db: &C,
        event: &PauseEvent,
    ) -> ResultEngine<()> {
        pause_events::ActiveModel::from(event).insert(db).await?;
        Ok(())
    }
}

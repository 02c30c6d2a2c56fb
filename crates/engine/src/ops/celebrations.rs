use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CelebrationEvent, CelebrationKind, EngineError, Period, RecordCelebrationCmd, ResultEngine,
    celebrations, util::normalize_optional_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Record one celebration and apply its effect on the owner's counters.
    ///
    /// - `bulk` draws the next serial number from the referenced allocation.
    /// - `personal` counts against the month of `celebrated_on`.
    /// - `fixed_date` and `special` are standalone events.
    ///
    /// Interrupting kinds then pause or resume the owner's allocations in the
    /// same transaction, as configured by [`InterruptionPolicy`]. On failure
    /// nothing is committed.
    ///
    /// [`InterruptionPolicy`]: crate::InterruptionPolicy
    pub async fn record_celebration(
        &self,
        cmd: RecordCelebrationCmd,
    ) -> ResultEngine<CelebrationEvent> {
        let result = match validate_record(&cmd, Utc::now().date_naive()) {
            Ok(()) => {
                self.with_retry("record_celebration", || self.record_once(&cmd))
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            tracing::debug!(
                owner_id = %cmd.owner_id,
                kind = %cmd.kind,
                error = %err,
                "celebration rejected"
            );
        }
        result
    }

    async fn record_once(&self, cmd: &RecordCelebrationCmd) -> ResultEngine<CelebrationEvent> {
        let now = Utc::now();
        with_tx!(self, |db_tx| {
            self.require_owner(&db_tx, &cmd.owner_id).await?;

            let event = CelebrationEvent::new(
                cmd.owner_id.clone(),
                cmd.celebrated_on,
                cmd.kind,
                normalize_optional_text(cmd.notes.as_deref()),
                normalize_optional_text(cmd.location.as_deref()),
                now,
            );

            let mut completes_current_month = false;
            let event = match (cmd.kind, cmd.allocation_id) {
                (CelebrationKind::Bulk, Some(allocation_id)) => {
                    let mut allocation = self
                        .require_allocation(&db_tx, &cmd.owner_id, allocation_id)
                        .await?;
                    let serial_number = allocation.celebrate(cmd.celebrated_on, now)?;
                    self.persist_allocation(&db_tx, &mut allocation).await?;
                    event.drawn_from(allocation.id, serial_number)
                }
                (CelebrationKind::Personal, _) => {
                    let obligation = self
                        .count_personal(&db_tx, &cmd.owner_id, Period::of(cmd.celebrated_on), now)
                        .await?;
                    completes_current_month = obligation.is_saturated()
                        && obligation.period == Period::of(now.date_naive());
                    event.counted_against(obligation.id)
                }
                _ => event,
            };

            celebrations::ActiveModel::from(&event).insert(&db_tx).await?;
            self.apply_interruption(&db_tx, &event, completes_current_month, now)
                .await?;

            tracing::info!(
                owner_id = %event.owner_id,
                celebration_id = %event.id,
                kind = %event.kind,
                serial_number = event.serial_number,
                "celebration recorded"
            );
            Ok(event)
        })
    }

    /// Pause/resume side effects of an interrupting celebration.
    ///
    /// A personal celebration that completes the current month resumes what
    /// earlier personal celebrations paused instead of pausing again.
    async fn apply_interruption<C: ConnectionTrait>(
        &self,
        db: &C,
        event: &CelebrationEvent,
        completes_current_month: bool,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        if !event.kind.is_interrupting() {
            return Ok(());
        }
        let reason = event.kind.as_str();

        if event.kind == CelebrationKind::Personal
            && completes_current_month
            && self.interruption.resume_on_monthly_completion
        {
            self.resume_paused_for(db, &event.owner_id, reason, true, at)
                .await?;
            return Ok(());
        }

        if self.interruption.pause_on_interruption {
            let paused = self
                .pause_active_for(db, &event.owner_id, reason, at)
                .await?;
            if !paused.is_empty() {
                tracing::info!(
                    owner_id = %event.owner_id,
                    reason,
                    count = paused.len(),
                    "allocations paused by interruption"
                );
            }
        }
        Ok(())
    }

    /// Delete a standalone celebration. Counted kinds (`bulk`, `personal`)
    /// back a counter and cannot be removed.
    pub async fn delete_celebration(&self, owner_id: &str, celebration_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let event = self
                .require_celebration(&db_tx, owner_id, celebration_id)
                .await?;
            if event.kind.is_counted() {
                return Err(EngineError::ImmutableCelebration(format!(
                    "{} celebration {celebration_id}",
                    event.kind
                )));
            }
            celebrations::Entity::delete_by_id(celebration_id.to_string())
                .exec(&db_tx)
                .await?;
            tracing::info!(owner_id, %celebration_id, "celebration deleted");
            Ok(())
        })
    }

    /// Celebrations drawn from an allocation, latest serial number first.
    pub async fn allocation_celebrations(
        &self,
        owner_id: &str,
        allocation_id: Uuid,
    ) -> ResultEngine<Vec<CelebrationEvent>> {
        self.require_allocation(&self.database, owner_id, allocation_id)
            .await?;
        let models = celebrations::Entity::find()
            .filter(celebrations::Column::AllocationId.eq(allocation_id.to_string()))
            .order_by_desc(celebrations::Column::SerialNumber)
            .all(&self.database)
            .await?;
        models.into_iter().map(CelebrationEvent::try_from).collect()
    }

    /// Celebrations of an owner with `from <= celebrated_on <= to`.
    pub async fn celebrations_between(
        &self,
        owner_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<CelebrationEvent>> {
        if from > to {
            return Err(EngineError::InvalidInput(format!(
                "empty date range: {from} > {to}"
            )));
        }
        self.require_owner(&self.database, owner_id).await?;
        let models = celebrations::Entity::find()
            .filter(celebrations::Column::OwnerId.eq(owner_id.to_string()))
            .filter(celebrations::Column::CelebratedOn.between(from, to))
            .order_by_asc(celebrations::Column::CelebratedOn)
            .order_by_asc(celebrations::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(CelebrationEvent::try_from).collect()
    }
}

/// Input checks that need no storage access.
fn validate_record(cmd: &RecordCelebrationCmd, today: NaiveDate) -> ResultEngine<()> {
    if cmd.celebrated_on > today {
        return Err(EngineError::InvalidInput(format!(
            "celebration date {} is in the future",
            cmd.celebrated_on
        )));
    }
    match (cmd.kind, cmd.allocation_id) {
        (CelebrationKind::Bulk, None) => Err(EngineError::InvalidInput(
            "bulk celebration requires an allocation".to_string(),
        )),
        (CelebrationKind::Bulk, Some(_)) | (_, None) => Ok(()),
        (kind, Some(allocation_id)) => Err(EngineError::InvalidInput(format!(
            "{kind} celebration cannot reference allocation {allocation_id}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 8).unwrap()
    }

    #[test]
    fn future_date_rejected() {
        let cmd = RecordCelebrationCmd::personal("alice", today().succ_opt().unwrap());
        assert!(matches!(
            validate_record(&cmd, today()),
            Err(EngineError::InvalidInput(_))
        ));
        let cmd = RecordCelebrationCmd::personal("alice", today());
        assert!(validate_record(&cmd, today()).is_ok());
    }

    #[test]
    fn allocation_reference_only_for_bulk() {
        let bulk = RecordCelebrationCmd::new("alice", today(), CelebrationKind::Bulk);
        assert!(validate_record(&bulk, today()).is_err());

        let bulk = RecordCelebrationCmd::bulk("alice", today(), Uuid::new_v4());
        assert!(validate_record(&bulk, today()).is_ok());

        let special = RecordCelebrationCmd::new("alice", today(), CelebrationKind::Special)
            .allocation_id(Uuid::new_v4());
        assert!(validate_record(&special, today()).is_err());
    }
}

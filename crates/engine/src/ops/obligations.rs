use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, QueryFilter, prelude::*, sea_query::Expr};

use crate::{
    EngineError, MonthlyObligation, MonthlyProgress, Period, ResultEngine, obligations,
};

use super::Engine;

impl Engine {
    async fn find_obligation<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: &str,
        period: Period,
    ) -> ResultEngine<Option<MonthlyObligation>> {
        obligations::Entity::find()
            .filter(obligations::Column::OwnerId.eq(owner_id.to_string()))
            .filter(obligations::Column::Year.eq(period.year))
            .filter(obligations::Column::Month.eq(period.month as i32))
            .one(db)
            .await?
            .map(MonthlyObligation::try_from)
            .transpose()
    }

    /// Count one personal celebration against the owner's period, creating
    /// the period row on first use.
    ///
    /// The increment is guarded in SQL (`completed < target`), so two
    /// writers racing on the last slot cannot both succeed.
    pub(super) async fn count_personal<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> ResultEngine<MonthlyObligation> {
        let mut obligation = match self.find_obligation(db, owner_id, period).await? {
            Some(obligation) => obligation,
            None => {
                let obligation =
                    MonthlyObligation::new(owner_id.to_string(), period, self.monthly_target, now)?;
                // A concurrent first insert trips the unique key: Conflict.
                obligations::ActiveModel::from(&obligation)
                    .insert(db)
                    .await?;
                obligation
            }
        };

        if obligation.is_saturated() {
            return Err(EngineError::MonthlyLimitReached(format!(
                "{owner_id} {period}"
            )));
        }

        let result = obligations::Entity::update_many()
            .col_expr(
                obligations::Column::Completed,
                Expr::col(obligations::Column::Completed).add(1),
            )
            .col_expr(obligations::Column::UpdatedAt, Expr::value(now))
            .filter(obligations::Column::Id.eq(obligation.id.to_string()))
            .filter(Expr::col(obligations::Column::Completed).lt(Expr::col(obligations::Column::Target)))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            let current = self.find_obligation(db, owner_id, period).await?;
            return Err(match current {
                Some(current) if current.is_saturated() => {
                    EngineError::MonthlyLimitReached(format!("{owner_id} {period}"))
                }
                _ => EngineError::Conflict(format!(
                    "monthly obligation {owner_id} {period} was modified concurrently"
                )),
            });
        }

        obligation.record(now)?;
        Ok(obligation)
    }

    /// Progress of a calendar month. A period nobody celebrated in yet
    /// projects as zero against the configured target.
    pub async fn monthly_progress(
        &self,
        owner_id: &str,
        period: Period,
        as_of: NaiveDate,
    ) -> ResultEngine<MonthlyProgress> {
        self.require_owner(&self.database, owner_id).await?;
        let (completed, target) = match self.find_obligation(&self.database, owner_id, period).await? {
            Some(obligation) => (obligation.completed, obligation.target),
            None => (0, self.monthly_target),
        };
        Ok(MonthlyProgress::new(
            owner_id.to_string(),
            period,
            completed,
            target,
            as_of,
        ))
    }
}

use sea_orm::DatabaseConnection;

use crate::{
    DEFAULT_MONTHLY_TARGET, EngineError, InterruptionPolicy, ProjectionPolicy, ResultEngine,
    RetryPolicy,
};

mod access;
mod allocations;
mod celebrations;
mod obligations;
mod owners;
mod projections;
mod retry;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of every ledger operation.
///
/// Cheap to clone: clones share the same connection pool, so concurrent
/// callers can each hold their own handle.
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    monthly_target: i64,
    retry: RetryPolicy,
    interruption: InterruptionPolicy,
    projection: ProjectionPolicy,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn monthly_target(&self) -> i64 {
        self.monthly_target
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    monthly_target: Option<i64>,
    retry: RetryPolicy,
    interruption: InterruptionPolicy,
    projection: ProjectionPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Personal celebrations required per month, applied to obligations
    /// created from now on.
    pub fn monthly_target(mut self, target: i64) -> EngineBuilder {
        self.monthly_target = Some(target);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> EngineBuilder {
        self.retry = retry;
        self
    }

    pub fn interruption(mut self, interruption: InterruptionPolicy) -> EngineBuilder {
        self.interruption = interruption;
        self
    }

    pub fn projection(mut self, projection: ProjectionPolicy) -> EngineBuilder {
        self.projection = projection;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let monthly_target = self.monthly_target.unwrap_or(DEFAULT_MONTHLY_TARGET);
        if monthly_target <= 0 {
            return Err(EngineError::InvalidInput(
                "monthly target must be > 0".to_string(),
            ));
        }
        if self.projection.critical_threshold > self.projection.warning_threshold {
            return Err(EngineError::InvalidInput(
                "critical threshold must not exceed warning threshold".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            monthly_target,
            retry: self.retry,
            interruption: self.interruption,
            projection: self.projection,
        })
    }
}

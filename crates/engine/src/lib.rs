//! Obligation ledger engine.
//!
//! Tracks two kinds of celebration obligations per owner: bulk allocations
//! counted down one serial number at a time, and a capped personal quota per
//! calendar month. Every write runs in one storage transaction so counters
//! and the celebration log never disagree.

pub use allocations::{AllocationState, BulkAllocation, Pause};
pub use celebrations::{CelebrationEvent, CelebrationKind};
pub use commands::{AllocationFilter, NewAllocationCmd, RecordCelebrationCmd};
pub use error::{EngineError, ErrorKind};
pub use obligations::{DEFAULT_MONTHLY_TARGET, MonthlyObligation, Period};
pub use ops::{Engine, EngineBuilder};
pub use owners::Owner;
pub use pause_events::{PauseEvent, PauseEventKind};
pub use policy::{InterruptionPolicy, RetryPolicy};
pub use projections::{
    AllocationProgress, Estimate, MonthlyProgress, MonthlyStatus, ProjectionPolicy, StatusLevel,
};

mod allocations;
mod celebrations;
mod commands;
mod error;
mod obligations;
mod ops;
mod owners;
mod pause_events;
mod policy;
mod projections;
mod util;

type ResultEngine<T> = Result<T, EngineError>;

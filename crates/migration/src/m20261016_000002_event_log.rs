//! Append-only event tables.
//!
//! - `celebrations`: one row per recorded celebration
//! - `pause_events`: pause/resume audit trail of bulk allocations
//!
//! Both are indexed by allocation and time for ordered replay.

use sea_orm_migration::prelude::*;

use crate::m20261016_000001_ledger::{BulkAllocations, MonthlyObligations, Owners};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Celebrations {
    Table,
    Id,
    OwnerId,
    CelebratedOn,
    Kind,
    AllocationId,
    ObligationId,
    SerialNumber,
    Notes,
    Location,
    CreatedAt,
}

#[derive(Iden)]
enum PauseEvents {
    Table,
    Id,
    AllocationId,
    Kind,
    Reason,
    Remaining,
    OccurredAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Celebrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Celebrations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Celebrations::OwnerId).string().not_null())
                    .col(ColumnDef::new(Celebrations::CelebratedOn).date().not_null())
                    .col(ColumnDef::new(Celebrations::Kind).string().not_null())
                    .col(ColumnDef::new(Celebrations::AllocationId).string())
                    .col(ColumnDef::new(Celebrations::ObligationId).string())
                    .col(ColumnDef::new(Celebrations::SerialNumber).big_integer())
                    .col(ColumnDef::new(Celebrations::Notes).string())
                    .col(ColumnDef::new(Celebrations::Location).string())
                    .col(ColumnDef::new(Celebrations::CreatedAt).timestamp().not_null())
                    .check(Expr::cust(
                        "kind IN ('personal', 'bulk', 'fixed_date', 'special')",
                    ))
                    .check(Expr::cust(
                        "(kind = 'bulk' AND allocation_id IS NOT NULL AND serial_number IS NOT NULL) \
                         OR (kind <> 'bulk' AND allocation_id IS NULL AND serial_number IS NULL)",
                    ))
                    .check(Expr::cust("kind = 'personal' OR obligation_id IS NULL"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-celebrations-owner_id")
                            .from(Celebrations::Table, Celebrations::OwnerId)
                            .to(Owners::Table, Owners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-celebrations-allocation_id")
                            .from(Celebrations::Table, Celebrations::AllocationId)
                            .to(BulkAllocations::Table, BulkAllocations::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-celebrations-obligation_id")
                            .from(Celebrations::Table, Celebrations::ObligationId)
                            .to(MonthlyObligations::Table, MonthlyObligations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-celebrations-allocation_id-created_at")
                    .table(Celebrations::Table)
                    .col(Celebrations::AllocationId)
                    .col(Celebrations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-celebrations-owner_id-celebrated_on")
                    .table(Celebrations::Table)
                    .col(Celebrations::OwnerId)
                    .col(Celebrations::CelebratedOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PauseEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PauseEvents::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PauseEvents::AllocationId).string().not_null())
                    .col(ColumnDef::new(PauseEvents::Kind).string().not_null())
                    .col(ColumnDef::new(PauseEvents::Reason).string())
                    .col(
                        ColumnDef::new(PauseEvents::Remaining)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PauseEvents::OccurredAt).timestamp().not_null())
                    .check(Expr::cust(
                        "(kind = 'pause' AND reason IS NOT NULL) \
                         OR (kind = 'resume' AND reason IS NULL)",
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pause_events-allocation_id")
                            .from(PauseEvents::Table, PauseEvents::AllocationId)
                            .to(BulkAllocations::Table, BulkAllocations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-pause_events-allocation_id-occurred_at")
                    .table(PauseEvents::Table)
                    .col(PauseEvents::AllocationId)
                    .col(PauseEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PauseEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Celebrations::Table).to_owned())
            .await?;
        Ok(())
    }
}

//! Counter tables.
//!
//! - `owners`: individuals holding obligations
//! - `bulk_allocations`: countdown pools with pause bookkeeping
//! - `monthly_obligations`: one personal quota row per owner and month
//!
//! Counter invariants are enforced by CHECK constraints as well, so a buggy
//! writer cannot commit an impossible state.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
pub(crate) enum Owners {
    Table,
    Id,
    DisplayName,
    CreatedAt,
}

#[derive(Iden)]
pub(crate) enum BulkAllocations {
    Table,
    Id,
    OwnerId,
    Title,
    Total,
    Remaining,
    Completed,
    Paused,
    PauseReason,
    PausedAt,
    CountAtPause,
    PauseAutomatic,
    ResumeCount,
    StartDate,
    CompletedOn,
    Notes,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub(crate) enum MonthlyObligations {
    Table,
    Id,
    OwnerId,
    Year,
    Month,
    Completed,
    Target,
    CreatedAt,
    UpdatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Owners
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Owners::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Owners::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Owners::DisplayName).string().not_null())
                    .col(ColumnDef::new(Owners::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Bulk allocations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BulkAllocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BulkAllocations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BulkAllocations::OwnerId).string().not_null())
                    .col(ColumnDef::new(BulkAllocations::Title).string().not_null())
                    .col(
                        ColumnDef::new(BulkAllocations::Total)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkAllocations::Remaining)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkAllocations::Completed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkAllocations::Paused)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(BulkAllocations::PauseReason).string())
                    .col(ColumnDef::new(BulkAllocations::PausedAt).timestamp())
                    .col(ColumnDef::new(BulkAllocations::CountAtPause).big_integer())
                    .col(
                        ColumnDef::new(BulkAllocations::PauseAutomatic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(BulkAllocations::ResumeCount).big_integer())
                    .col(ColumnDef::new(BulkAllocations::StartDate).date().not_null())
                    .col(ColumnDef::new(BulkAllocations::CompletedOn).date())
                    .col(ColumnDef::new(BulkAllocations::Notes).string())
                    .col(
                        ColumnDef::new(BulkAllocations::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BulkAllocations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BulkAllocations::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .check(Expr::cust("total > 0"))
                    .check(Expr::cust("remaining >= 0"))
                    .check(Expr::cust("total = remaining + completed"))
                    .check(Expr::cust(
                        "(paused AND pause_reason IS NOT NULL AND paused_at IS NOT NULL \
                           AND count_at_pause = remaining) \
                         OR (NOT paused AND pause_reason IS NULL AND paused_at IS NULL \
                           AND count_at_pause IS NULL AND NOT pause_automatic)",
                    ))
                    .check(Expr::cust("NOT (paused AND remaining = 0)"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bulk_allocations-owner_id")
                            .from(BulkAllocations::Table, BulkAllocations::OwnerId)
                            .to(Owners::Table, Owners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bulk_allocations-owner_id-remaining")
                    .table(BulkAllocations::Table)
                    .col(BulkAllocations::OwnerId)
                    .col(BulkAllocations::Remaining)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Monthly obligations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(MonthlyObligations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MonthlyObligations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MonthlyObligations::OwnerId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonthlyObligations::Year).integer().not_null())
                    .col(ColumnDef::new(MonthlyObligations::Month).integer().not_null())
                    .col(
                        ColumnDef::new(MonthlyObligations::Completed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonthlyObligations::Target)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyObligations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyObligations::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .check(Expr::cust("month BETWEEN 1 AND 12"))
                    .check(Expr::cust("target > 0"))
                    .check(Expr::cust("completed >= 0 AND completed <= target"))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-monthly_obligations-owner_id")
                            .from(MonthlyObligations::Table, MonthlyObligations::OwnerId)
                            .to(Owners::Table, Owners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-monthly_obligations-owner_id-period-unique")
                    .table(MonthlyObligations::Table)
                    .col(MonthlyObligations::OwnerId)
                    .col(MonthlyObligations::Year)
                    .col(MonthlyObligations::Month)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MonthlyObligations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BulkAllocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Owners::Table).to_owned())
            .await?;
        Ok(())
    }
}

use std::{error::Error, fs::File};

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    AllocationFilter, AllocationState, CelebrationKind, Engine, EngineError, NewAllocationCmd,
    Period, RecordCelebrationCmd,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use serde::Serialize;
use uuid::Uuid;

mod import;
mod settings;

#[derive(Parser, Debug)]
#[command(name = "massledger_admin")]
#[command(about = "Admin utilities for the obligation ledger")]
struct Cli {
    /// Settings file (defaults to an optional `massledger.toml`).
    #[arg(long)]
    config: Option<String>,

    /// Database connection string, overrides the settings file (also read
    /// from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Owner(Owner),
    Allocation(Allocation),
    /// Record one celebration.
    Celebrate(CelebrateArgs),
    Progress(Progress),
    /// Unfinished allocations close to completion.
    Low(LowArgs),
    /// Import celebrations from a CSV file.
    Import(ImportArgs),
}

#[derive(Args, Debug)]
struct Owner {
    #[command(subcommand)]
    command: OwnerCommand,
}

#[derive(Subcommand, Debug)]
enum OwnerCommand {
    Create(OwnerCreateArgs),
}

#[derive(Args, Debug)]
struct OwnerCreateArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct Allocation {
    #[command(subcommand)]
    command: AllocationCommand,
}

#[derive(Subcommand, Debug)]
enum AllocationCommand {
    Create(AllocationCreateArgs),
    Pause(PauseArgs),
    Resume(AllocationIdArgs),
    ResumeInterrupted(ResumeInterruptedArgs),
    List(ListArgs),
    /// Pause/resume history of one allocation.
    History(OwnedAllocationArgs),
}

#[derive(Args, Debug)]
struct AllocationCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    total: i64,
    /// Defaults to today.
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct PauseArgs {
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    reason: String,
}

#[derive(Args, Debug)]
struct AllocationIdArgs {
    #[arg(long)]
    id: Uuid,
}

#[derive(Args, Debug)]
struct OwnedAllocationArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    id: Uuid,
}

#[derive(Args, Debug)]
struct ResumeInterruptedArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    reason: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    owner: String,
    /// `active`, `paused` or `completed`; all when omitted.
    #[arg(long, value_parser = parse_state)]
    state: Option<AllocationState>,
    #[arg(long)]
    reason: Option<String>,
}

#[derive(Args, Debug)]
struct CelebrateArgs {
    #[arg(long)]
    owner: String,
    /// `personal`, `bulk`, `fixed_date` or `special`.
    #[arg(long, value_parser = parse_kind)]
    kind: CelebrationKind,
    /// Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    allocation: Option<Uuid>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    location: Option<String>,
}

#[derive(Args, Debug)]
struct Progress {
    #[command(subcommand)]
    command: ProgressCommand,
}

#[derive(Subcommand, Debug)]
enum ProgressCommand {
    Allocation(AllocationProgressArgs),
    Monthly(MonthlyProgressArgs),
}

#[derive(Args, Debug)]
struct AllocationProgressArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    id: Uuid,
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct MonthlyProgressArgs {
    #[arg(long)]
    owner: String,
    /// Period as `YYYY-MM`; defaults to the month of `as_of`.
    #[arg(long, value_parser = parse_period)]
    period: Option<Period>,
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct LowArgs {
    #[arg(long)]
    owner: String,
    /// Defaults to the configured warning threshold.
    #[arg(long)]
    threshold: Option<i64>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    file: String,
    #[arg(long)]
    owner: String,
}

fn parse_kind(raw: &str) -> Result<CelebrationKind, String> {
    CelebrationKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_state(raw: &str) -> Result<AllocationState, String> {
    match raw {
        "active" => Ok(AllocationState::Active),
        "paused" => Ok(AllocationState::Paused),
        "completed" => Ok(AllocationState::Completed),
        other => Err(format!("unknown allocation state: {other}")),
    }
}

fn parse_period(raw: &str) -> Result<Period, String> {
    let (year, month) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got {raw:?}"))?;
    let year = year.parse().map_err(|_| format!("invalid year in {raw:?}"))?;
    let month = month.parse().map_err(|_| format!("invalid month in {raw:?}"))?;
    Period::new(year, month).map_err(|err| err.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run(
    cli: Cli,
    settings: settings::Settings,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let database_url = cli.database_url.unwrap_or(settings.database_url);
    let db = connect_db(&database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .monthly_target(settings.monthly_target)
        .retry(settings.retry)
        .interruption(settings.interruption)
        .projection(settings.projection)
        .build()
        .await?;
    let today = Utc::now().date_naive();

    match cli.command {
        Command::Owner(Owner {
            command: OwnerCommand::Create(args),
        }) => print_json(&engine.new_owner(&args.id, &args.name).await?),
        Command::Allocation(Allocation { command }) => match command {
            AllocationCommand::Create(args) => {
                let mut cmd = NewAllocationCmd::new(
                    args.owner,
                    args.title,
                    args.total,
                    args.start_date.unwrap_or(today),
                );
                if let Some(notes) = args.notes {
                    cmd = cmd.notes(notes);
                }
                print_json(&engine.new_allocation(cmd).await?)
            }
            AllocationCommand::Pause(args) => {
                print_json(&engine.pause_allocation(args.id, &args.reason).await?)
            }
            AllocationCommand::Resume(args) => {
                print_json(&engine.resume_allocation(args.id).await?)
            }
            AllocationCommand::ResumeInterrupted(args) => print_json(
                &engine
                    .resume_interrupted(&args.owner, &args.reason)
                    .await?,
            ),
            AllocationCommand::List(args) => {
                let mut filter = AllocationFilter::default();
                if let Some(state) = args.state {
                    filter = filter.state(state);
                }
                if let Some(reason) = args.reason {
                    filter = filter.pause_reason(reason);
                }
                print_json(&engine.list_allocations(&args.owner, filter).await?)
            }
            AllocationCommand::History(args) => {
                print_json(&engine.pause_history(&args.owner, args.id).await?)
            }
        },
        Command::Celebrate(args) => {
            let mut cmd =
                RecordCelebrationCmd::new(args.owner, args.date.unwrap_or(today), args.kind);
            if let Some(allocation_id) = args.allocation {
                cmd = cmd.allocation_id(allocation_id);
            }
            if let Some(notes) = args.notes {
                cmd = cmd.notes(notes);
            }
            if let Some(location) = args.location {
                cmd = cmd.location(location);
            }
            print_json(&engine.record_celebration(cmd).await?)
        }
        Command::Progress(Progress { command }) => match command {
            ProgressCommand::Allocation(args) => print_json(
                &engine
                    .allocation_progress(&args.owner, args.id, args.as_of.unwrap_or(today))
                    .await?,
            ),
            ProgressCommand::Monthly(args) => {
                let as_of = args.as_of.unwrap_or(today);
                let period = args.period.unwrap_or_else(|| Period::of(as_of));
                print_json(&engine.monthly_progress(&args.owner, period, as_of).await?)
            }
        },
        Command::Low(args) => {
            let threshold = args
                .threshold
                .unwrap_or(settings.projection.warning_threshold);
            print_json(&engine.list_low_allocations(&args.owner, threshold).await?)
        }
        Command::Import(args) => {
            let file = File::open(&args.file)?;
            let report = import::import(&engine, &args.owner, file, &settings.import).await?;
            print_json(&report)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "massledger_admin={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    if let Err(err) = run(cli, settings).await {
        match err.downcast_ref::<EngineError>() {
            Some(engine_err) => eprintln!("{}: {engine_err}", engine_err.kind().as_str()),
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
    Ok(())
}

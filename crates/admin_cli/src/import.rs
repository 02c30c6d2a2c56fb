//! CSV batch import of celebrations.
//!
//! Rows are parsed through the configured [`ImportTemplate`] and recorded one
//! by one, so a bad row never blocks the rest of the file. Every failure is
//! reported with its 1-based source line. Identical rows are distinct
//! celebrations; only a repeated value in the optional id column marks a
//! duplicate.

use std::{collections::HashSet, io::Read};

use chrono::NaiveDate;
use engine::{CelebrationKind, Engine, RecordCelebrationCmd};
use serde::Serialize;
use uuid::Uuid;

use crate::settings::ImportTemplate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: u64,
    pub kind: String,
    pub message: String,
}

impl RowFailure {
    fn validation(row: u64, message: impl Into<String>) -> Self {
        Self {
            row,
            kind: "validation".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_duplicates: usize,
    pub failures: Vec<RowFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParsedRow {
    pub row: u64,
    pub celebrated_on: NaiveDate,
    pub kind: CelebrationKind,
    pub allocation_id: Option<Uuid>,
    pub external_id: Option<String>,
}

impl ParsedRow {
    fn into_cmd(self, owner_id: &str) -> RecordCelebrationCmd {
        let cmd = RecordCelebrationCmd::new(owner_id, self.celebrated_on, self.kind);
        match self.allocation_id {
            Some(allocation_id) => cmd.allocation_id(allocation_id),
            None => cmd,
        }
    }
}

struct Columns {
    date: usize,
    kind: Option<usize>,
    allocation: Option<usize>,
    id: Option<usize>,
}

fn resolve_columns(
    template: &ImportTemplate,
    headers: Option<&csv::StringRecord>,
) -> Result<Columns, String> {
    let find = |name: &str| -> Option<usize> {
        let name = name.trim();
        match headers {
            Some(headers) => headers.iter().position(|h| h.trim() == name),
            None => name.parse().ok(),
        }
    };
    let date = find(&template.date_column)
        .ok_or_else(|| format!("missing date column {:?}", template.date_column))?;
    Ok(Columns {
        date,
        kind: find(&template.kind_column),
        allocation: find(&template.allocation_column),
        id: template.id_column.as_deref().and_then(find),
    })
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_record(
    record: &csv::StringRecord,
    row: u64,
    columns: &Columns,
    template: &ImportTemplate,
) -> Result<ParsedRow, RowFailure> {
    let raw_date = cell(record, Some(columns.date))
        .ok_or_else(|| RowFailure::validation(row, "missing date"))?;
    let celebrated_on = NaiveDate::parse_from_str(raw_date, &template.date_format).map_err(|err| {
        RowFailure::validation(row, format!("invalid date {raw_date:?}: {err}"))
    })?;

    let kind = match cell(record, columns.kind) {
        Some(raw) => CelebrationKind::try_from(raw.to_lowercase().as_str())
            .map_err(|err| RowFailure::validation(row, err.to_string()))?,
        None => template.default_kind,
    };

    let allocation_id = cell(record, columns.allocation)
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| RowFailure::validation(row, format!("invalid allocation id {raw:?}")))
        })
        .transpose()?;

    Ok(ParsedRow {
        row,
        celebrated_on,
        kind,
        allocation_id,
        external_id: cell(record, columns.id).map(str::to_string),
    })
}

/// Parse a CSV source. Rows that fail to parse are returned as failures;
/// rows repeating an earlier id are dropped and counted.
pub fn parse_rows<R: Read>(
    reader: R,
    template: &ImportTemplate,
) -> Result<(Vec<ParsedRow>, Vec<RowFailure>, usize), csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(template.has_headers)
        .flexible(true)
        .from_reader(reader);

    let headers = if template.has_headers {
        Some(reader.headers()?.clone())
    } else {
        None
    };
    let columns = resolve_columns(template, headers.as_ref())
        .map_err(|message| csv::Error::from(std::io::Error::other(message)))?;

    let mut rows = Vec::new();
    let mut failures = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicates = 0;

    for (index, record) in reader.records().enumerate() {
        let fallback = index as u64 + if template.has_headers { 2 } else { 1 };
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let row = err.position().map_or(fallback, |p| p.line());
                failures.push(RowFailure::validation(row, err.to_string()));
                continue;
            }
        };
        let row = record.position().map_or(fallback, |p| p.line());

        match parse_record(&record, row, &columns, template) {
            Ok(parsed) => {
                let repeated = parsed
                    .external_id
                    .as_ref()
                    .is_some_and(|id| !seen.insert(id.clone()));
                if repeated {
                    duplicates += 1;
                } else {
                    rows.push(parsed);
                }
            }
            Err(failure) => failures.push(failure),
        }
    }

    Ok((rows, failures, duplicates))
}

/// Record every parsed row for `owner_id`, collecting failures.
pub async fn import<R: Read>(
    engine: &Engine,
    owner_id: &str,
    reader: R,
    template: &ImportTemplate,
) -> Result<ImportReport, csv::Error> {
    let (rows, failures, skipped_duplicates) = parse_rows(reader, template)?;
    let mut report = ImportReport {
        imported: 0,
        skipped_duplicates,
        failures,
    };

    for parsed in rows {
        let row = parsed.row;
        match engine.record_celebration(parsed.into_cmd(owner_id)).await {
            Ok(_) => report.imported += 1,
            Err(err) => report.failures.push(RowFailure {
                row,
                kind: err.kind().as_str().to_string(),
                message: err.to_string(),
            }),
        }
    }

    report.failures.sort_by_key(|failure| failure.row);
    tracing::info!(
        owner_id,
        imported = report.imported,
        failed = report.failures.len(),
        skipped = report.skipped_duplicates,
        "import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,kind,allocation
2025-01-02,personal,
2025-01-03,,
not-a-date,personal,
2025-01-02,personal,
2025-01-04,bulk,67e55044-10b1-426f-9247-bb680e5fe0c8
2025-01-05,vigil,
";

    #[test]
    fn rows_are_parsed_with_line_numbers() {
        let (rows, failures, duplicates) =
            parse_rows(SAMPLE.as_bytes(), &ImportTemplate::default()).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[1].kind, CelebrationKind::Personal);
        assert_eq!(rows[2].row, 5);
        assert_eq!(rows[2].celebrated_on, rows[0].celebrated_on);
        assert_eq!(rows[3].kind, CelebrationKind::Bulk);
        assert!(rows[3].allocation_id.is_some());
        assert_eq!(duplicates, 0);

        let failed_rows: Vec<u64> = failures.iter().map(|f| f.row).collect();
        assert_eq!(failed_rows, vec![4, 7]);
        assert!(failures.iter().all(|f| f.kind == "validation"));
    }

    #[test]
    fn headerless_positions() {
        let template = ImportTemplate {
            has_headers: false,
            date_column: "1".to_string(),
            kind_column: "0".to_string(),
            allocation_column: "2".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            ..ImportTemplate::default()
        };
        let (rows, failures, _) = parse_rows("special,24/12/2024\n".as_bytes(), &template).unwrap();
        assert!(failures.is_empty());
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].kind, CelebrationKind::Special);
        assert_eq!(rows[0].celebrated_on, NaiveDate::from_ymd_opt(2024, 12, 24).unwrap());
    }

    #[test]
    fn repeated_ids_are_skipped() {
        let template = ImportTemplate {
            id_column: Some("ref".to_string()),
            ..ImportTemplate::default()
        };
        let source = "\
ref,date,kind
a1,2025-01-02,personal
a1,2025-01-02,personal
,2025-01-02,personal
,2025-01-02,personal
";
        let (rows, failures, duplicates) = parse_rows(source.as_bytes(), &template).unwrap();
        assert!(failures.is_empty());
        assert_eq!(duplicates, 1);
        let lines: Vec<u64> = rows.iter().map(|r| r.row).collect();
        assert_eq!(lines, vec![2, 4, 5]);
    }

    #[tokio::test]
    async fn same_day_bulk_rows_draw_consecutive_serials() {
        use engine::NewAllocationCmd;
        use migration::MigratorTrait;
        use sea_orm::Database;

        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db).build().await.unwrap();
        engine.new_owner("alice", "Alice").await.unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let alloc = engine
            .new_allocation(NewAllocationCmd::new("alice", "Province", 30, start))
            .await
            .unwrap();

        let source = format!(
            "date,kind,allocation\n2025-01-04,bulk,{id}\n2025-01-04,bulk,{id}\n",
            id = alloc.id
        );
        let report = import(&engine, "alice", source.as_bytes(), &ImportTemplate::default())
            .await
            .unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped_duplicates, 0);
        assert!(report.failures.is_empty());

        let drawn = engine
            .allocation_celebrations("alice", alloc.id)
            .await
            .unwrap();
        let serials: Vec<i64> = drawn.iter().filter_map(|e| e.serial_number).collect();
        assert_eq!(serials, vec![30, 29]);
    }

    #[tokio::test]
    async fn engine_rejections_keep_their_row() {
        use migration::MigratorTrait;
        use sea_orm::Database;

        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db).build().await.unwrap();
        engine.new_owner("alice", "Alice").await.unwrap();

        let source = "\
date,kind
2025-01-02,personal
2025-01-03,personal
2025-01-04,personal
2025-01-05,personal
2025-01-06,special
";
        let report = import(&engine, "alice", source.as_bytes(), &ImportTemplate::default())
            .await
            .unwrap();
        assert_eq!(report.imported, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row, 5);
        assert_eq!(report.failures[0].kind, "precondition");
    }

    #[test]
    fn missing_date_header_is_fatal() {
        let template = ImportTemplate {
            date_column: "day".to_string(),
            ..ImportTemplate::default()
        };
        assert!(parse_rows(SAMPLE.as_bytes(), &template).is_err());
    }
}

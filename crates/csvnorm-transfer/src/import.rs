use std::collections::BTreeSet;
use std::io::Read;

use csvnorm_core::{
    ColumnTidier, DatabaseSchema, Error, FlatRow, RowCleaner, TableName, TypeCoercer, Value,
    ensure_distinct_labels, make_row_cleaner, make_type_coercer,
};
use csvnorm_sqlx::{RenormaliseOptions, Renormaliser, Session, insert_row, prepare_renormalise};

use crate::errors::TransferError;
use crate::model::{ImportOptions, ImportReport, RejectedRow};

const ROW_SAVEPOINT: &str = "csvnorm_row";

/// Read a flat CSV and insert every record into `table_name`.
///
/// Each record goes through renormalisation, cleaning and coercion before it
/// is inserted. Header names must be distinct flat column names of the table.
///
/// No transaction is opened or committed here. Inside a caller's transaction
/// every row stays uncommitted until the caller commits; outside one the
/// engine autocommits each insert. When invalid rows are skipped, each insert
/// runs under a savepoint so a failing row leaves the surrounding transaction
/// usable. Postgres needs that transaction to be open already, and on SQLite
/// a savepoint released outside a transaction commits its row.
pub async fn import_table<S, R>(
    session: &S,
    catalog: &DatabaseSchema,
    table_name: &TableName,
    tidier: &dyn ColumnTidier,
    options: &ImportOptions,
    reader: R,
) -> Result<ImportReport, TransferError>
where
    S: Session + ?Sized,
    R: Read,
{
    let table = catalog.require_table(table_name)?;
    let renormaliser = prepare_renormalise(
        session,
        catalog,
        table_name,
        tidier,
        &RenormaliseOptions {
            coerce: options.coerce.clone(),
            preload: options.preload_lookups,
        },
    )
    .await?;
    let pipeline = RowPipeline {
        renormaliser,
        cleaner: make_row_cleaner(table),
        coercer: make_type_coercer(table, options.coerce.clone()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let known: BTreeSet<&str> = pipeline.renormaliser.mapping().flat_names(table).collect();
    if let Some(unknown) = headers.iter().find(|header| !known.contains(header)) {
        let err = Error::Schema(format!(
            "CSV column {unknown:?} is not a column of {table_name}"
        ));
        return Err(err.into());
    }
    ensure_distinct_labels(table_name, headers.iter())?;

    let mut report = ImportReport {
        table: table_name.to_string(),
        dry_run: options.dry_run,
        ..ImportReport::default()
    };

    for record in reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(report.rows_read + 2);
        report.rows_read += 1;

        let flat: FlatRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), Value::from(cell)))
            .collect();

        let outcome = if options.skip_invalid_rows && !options.dry_run {
            guarded_insert(session, catalog, table_name, &pipeline, &flat).await
        } else {
            pipeline
                .write(session, catalog, table_name, &flat, options.dry_run)
                .await
        };

        match outcome {
            Ok(()) => report.rows_inserted += 1,
            Err(err) if options.skip_invalid_rows && is_skippable(&err) => {
                tracing::warn!(
                    event = "row_rejected",
                    table = %table_name,
                    line,
                    error = %err,
                );
                report.rejected.push(RejectedRow {
                    line,
                    error: err.to_string(),
                });
            }
            Err(err) => return Err(TransferError::Row { line, source: err }),
        }
    }

    tracing::info!(
        event = "table_imported",
        table = %table_name,
        rows_read = report.rows_read,
        rows_inserted = report.rows_inserted,
        rejected = report.rejected.len(),
        dry_run = report.dry_run,
    );
    Ok(report)
}

struct RowPipeline<'s, S: Session + ?Sized> {
    renormaliser: Renormaliser<'s, S>,
    cleaner: RowCleaner,
    coercer: TypeCoercer,
}

impl<S: Session + ?Sized> RowPipeline<'_, S> {
    async fn write(
        &self,
        session: &S,
        catalog: &DatabaseSchema,
        table_name: &TableName,
        flat: &FlatRow,
        dry_run: bool,
    ) -> csvnorm_core::Result<()> {
        let resolved = self.renormaliser.renormalise(flat).await?;
        let row = self.coercer.coerce(&self.cleaner.clean(&resolved))?;
        if !dry_run {
            insert_row(session, catalog, table_name, &row).await?;
        }
        Ok(())
    }
}

async fn guarded_insert<S: Session + ?Sized>(
    session: &S,
    catalog: &DatabaseSchema,
    table_name: &TableName,
    pipeline: &RowPipeline<'_, S>,
    flat: &FlatRow,
) -> csvnorm_core::Result<()> {
    session
        .execute(&format!("SAVEPOINT {ROW_SAVEPOINT}"), &[])
        .await?;
    match pipeline.write(session, catalog, table_name, flat, false).await {
        Ok(()) => {
            session
                .execute(&format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"), &[])
                .await?;
            Ok(())
        }
        Err(err) => {
            session
                .execute(&format!("ROLLBACK TO SAVEPOINT {ROW_SAVEPOINT}"), &[])
                .await?;
            session
                .execute(&format!("RELEASE SAVEPOINT {ROW_SAVEPOINT}"), &[])
                .await?;
            Err(err)
        }
    }
}

/// Row content failures and statement failures can be skipped; a broken
/// catalog cannot.
fn is_skippable(err: &Error) -> bool {
    err.is_row_error() || matches!(err, Error::Db(_))
}

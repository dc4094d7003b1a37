use std::io::Write;

use csvnorm_core::{ColumnTidier, DatabaseSchema, TableName, Value};
use csvnorm_sqlx::{Session, fetch_denormalised, prepare_denormalise};

use crate::errors::TransferError;
use crate::model::{ExportOptions, ExportReport};

/// Write `table_name` as CSV: a header of flat column names, then one record
/// per row ordered by primary key, foreign keys shown by their natural key.
pub async fn export_table<S, W>(
    session: &S,
    catalog: &DatabaseSchema,
    table_name: &TableName,
    tidier: &dyn ColumnTidier,
    options: &ExportOptions,
    writer: W,
) -> Result<ExportReport, TransferError>
where
    S: Session + ?Sized,
    W: Write,
{
    let (query, columns) = prepare_denormalise(catalog, table_name, tidier, &options.denormalise)?;
    let rows = fetch_denormalised(session, &query).await?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(CountingWriter::new(writer));
    writer.write_record(&columns)?;

    for row in &rows {
        let record: Vec<String> = row.iter().map(|value| render(value, options)).collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;

    let report = ExportReport {
        table: table_name.to_string(),
        columns,
        rows: rows.len() as u64,
        bytes_written: counting.bytes_written(),
    };
    tracing::info!(
        event = "table_exported",
        table = %table_name,
        rows = report.rows,
        bytes_written = report.bytes_written,
    );
    Ok(report)
}

fn render(value: &Value, options: &ExportOptions) -> String {
    match value {
        Value::Date(date) => date.format(&options.date_format).to_string(),
        Value::Timestamp(ts) => ts.format(&options.timestamp_format).to_string(),
        other => other.to_csv(),
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

use csvnorm_core::{
    ColumnTidier, DatabaseSchema, DenormaliseOptions, DenormaliseQuery, Result, TableName, Value,
    build_denormalise_query,
};

use crate::session::Session;

/// Build the denormalising read for `table_name` together with its output
/// column names, in projection order.
pub fn prepare_denormalise(
    catalog: &DatabaseSchema,
    table_name: &TableName,
    tidier: &dyn ColumnTidier,
    options: &DenormaliseOptions,
) -> Result<(DenormaliseQuery, Vec<String>)> {
    let query = build_denormalise_query(catalog, table_name, tidier, options)?;
    let column_names = query.column_names();
    tracing::debug!(
        event = "denormalise_prepared",
        table = %table_name,
        columns = column_names.len(),
        joins = query.columns.iter().filter(|column| column.denormalised).count(),
    );
    Ok((query, column_names))
}

/// Run a prepared read. Each row holds one value per output column.
pub async fn fetch_denormalised<S>(session: &S, query: &DenormaliseQuery) -> Result<Vec<Vec<Value>>>
where
    S: Session + ?Sized,
{
    let rows = session
        .fetch_rows(&query.sql, &[], &query.column_types())
        .await?;
    tracing::debug!(event = "denormalise_fetched", table = %query.table, rows = rows.len());
    Ok(rows)
}

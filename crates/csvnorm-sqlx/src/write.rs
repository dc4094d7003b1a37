use csvnorm_core::{
    Column, DatabaseSchema, Error, ResolvedRow, Result, TableName, Value, insert_sql,
};

use crate::session::Session;

/// Insert one resolved row into `table_name`.
///
/// Columns are written in declaration order. NULL values are left out so the
/// column default applies. A key that is not a column of the table is a
/// schema error.
pub async fn insert_row<S>(
    session: &S,
    catalog: &DatabaseSchema,
    table_name: &TableName,
    row: &ResolvedRow,
) -> Result<u64>
where
    S: Session + ?Sized,
{
    let table = catalog.require_table(table_name)?;
    if let Some(unknown) = row.keys().find(|key| table.column(key).is_none()) {
        return Err(Error::Schema(format!(
            "column {unknown:?} not found in {table_name}"
        )));
    }

    let (columns, params): (Vec<&Column>, Vec<Value>) = table
        .columns
        .iter()
        .filter_map(|column| match row.get(&column.name) {
            Some(value) if !value.is_null() => Some((column, value.clone())),
            _ => None,
        })
        .unzip();

    let sql = insert_sql(table_name, &columns, session.dialect());
    session.execute(&sql, &params).await
}

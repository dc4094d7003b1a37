use async_trait::async_trait;

use csvnorm_core::{DatabaseSchema, Dialect, Error, NativeType, Result, Value};

use crate::options::IntrospectOptions;

/// A database connection csvnorm can read from and write to.
///
/// Statements use the positional placeholders of [`Session::dialect`].
/// Sessions never commit on their own; callers own transaction boundaries.
#[async_trait]
pub trait Session: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    fn dialect(&self) -> Dialect;

    /// Run a query and decode every row, column `i` as `column_types[i]`.
    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[Value],
        column_types: &[NativeType],
    ) -> Result<Vec<Vec<Value>>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Introspect the database and return a catalog snapshot.
    async fn introspect(&self, opts: &IntrospectOptions) -> Result<DatabaseSchema>;
}

pub(crate) fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

pub(crate) fn decode_error(index: usize, native: NativeType, err: sqlx::Error) -> Error {
    Error::Db(format!("cannot decode column {index} as {native}: {err}"))
}

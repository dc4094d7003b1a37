use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Row, Sqlite, ValueRef};
use tokio::sync::Mutex;

use csvnorm_core::{
    Constraint, DatabaseSchema, Dialect, NativeType, Result, SCHEMA_VERSION, Schema, Table, Value,
};

use crate::options::IntrospectOptions;
use crate::session::{Session, db_error, decode_error};

mod mapper;
mod queries;

pub use mapper::SQLITE_SCHEMA;

/// Session over a single SQLite connection.
///
/// One connection is kept for the whole session so that in-memory databases
/// and explicit transactions behave as callers expect.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Mutex<SqliteConnection>,
    database: Option<String>,
}

impl SqliteSession {
    /// Open `url` (`sqlite:path.db`, `sqlite::memory:`) with foreign key
    /// enforcement turned on.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error)?
            .foreign_keys(true);
        let conn = options.connect().await.map_err(db_error)?;

        let database = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .map(String::from);
        tracing::debug!(event = "sqlite_connected", database = ?database);

        Ok(Self {
            conn: Mutex::new(conn),
            database,
        })
    }

    /// Wrap a connection opened elsewhere.
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
            database: None,
        }
    }

    pub async fn begin(&self) -> Result<()> {
        self.execute("BEGIN", &[]).await.map(|_| ())
    }

    pub async fn commit(&self) -> Result<()> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }
}

#[async_trait]
impl Session for SqliteSession {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        params: &[Value],
        column_types: &[NativeType],
    ) -> Result<Vec<Vec<Value>>> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let mut conn = self.conn.lock().await;
        let rows = query.fetch_all(&mut *conn).await.map_err(db_error)?;

        rows.iter()
            .map(|row| {
                column_types
                    .iter()
                    .enumerate()
                    .map(|(index, native)| decode_value(row, index, *native))
                    .collect()
            })
            .collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let mut conn = self.conn.lock().await;
        let done = query.execute(&mut *conn).await.map_err(db_error)?;
        Ok(done.rows_affected())
    }

    async fn introspect(&self, opts: &IntrospectOptions) -> Result<DatabaseSchema> {
        let mut conn = self.conn.lock().await;
        introspect(&mut conn, self.database.clone(), opts).await
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(value) => query.bind(*value),
        Value::Int(value) => query.bind(*value),
        Value::Float(value) => query.bind(*value),
        Value::Text(value) => query.bind(value.clone()),
        Value::Date(value) => query.bind(*value),
        Value::Timestamp(value) => query.bind(*value),
    }
}

fn decode_value(row: &SqliteRow, index: usize, native: NativeType) -> Result<Value> {
    let raw = row.try_get_raw(index).map_err(db_error)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let typed = match native {
        NativeType::Integer => row.try_get::<i64, _>(index).map(Value::Int),
        NativeType::Float => row
            .try_get::<f64, _>(index)
            .or_else(|_| row.try_get::<i64, _>(index).map(|value| value as f64))
            .map(Value::Float),
        NativeType::Boolean => row.try_get::<bool, _>(index).map(Value::Bool),
        NativeType::Date => row.try_get::<NaiveDate, _>(index).map(Value::Date),
        NativeType::Timestamp => row.try_get::<NaiveDateTime, _>(index).map(Value::Timestamp),
        NativeType::Text | NativeType::Other => row.try_get::<String, _>(index).map(Value::Text),
    };

    // SQLite keeps whatever was stored whatever the declared type says; such
    // cells are read back as text.
    typed
        .or_else(|_| row.try_get_unchecked::<String, _>(index).map(Value::Text))
        .map_err(|err| decode_error(index, native, err))
}

/// Introspect the `main` database of a SQLite connection.
pub async fn introspect(
    conn: &mut SqliteConnection,
    database: Option<String>,
    opts: &IntrospectOptions,
) -> Result<DatabaseSchema> {
    let mut schemas = Vec::new();

    if !opts.filter_schemas(vec![SQLITE_SCHEMA.to_string()]).is_empty() {
        let mut tables = Vec::new();
        for name in queries::list_tables(conn).await? {
            tables.push(introspect_table(conn, name).await?);
        }
        tracing::debug!(event = "sqlite_introspected", tables = tables.len());
        schemas.push(Schema {
            name: SQLITE_SCHEMA.to_string(),
            tables,
        });
    }

    Ok(DatabaseSchema {
        schema_version: SCHEMA_VERSION.to_string(),
        engine: "sqlite".to_string(),
        database,
        schemas,
    })
}

async fn introspect_table(conn: &mut SqliteConnection, name: String) -> Result<Table> {
    let raw_columns = queries::list_columns(conn, &name).await?;
    let columns = mapper::map_columns(&raw_columns);

    let mut constraints = Vec::new();
    if let Some(pk) = mapper::map_primary_key(&raw_columns) {
        constraints.push(Constraint::PrimaryKey(pk));
    }

    for index in queries::list_indexes(conn, &name).await? {
        if index.is_unique == 0 || index.origin == "pk" {
            continue;
        }
        let index_columns = queries::list_index_columns(conn, &index.name).await?;
        if let Some(unique) = mapper::map_unique_index(&index, index_columns) {
            constraints.push(Constraint::Unique(unique));
        }
    }

    let raw_fks = queries::list_foreign_keys(conn, &name).await?;
    constraints.extend(
        mapper::map_foreign_keys(raw_fks)
            .into_iter()
            .map(Constraint::ForeignKey),
    );
    mapper::sort_constraints(&mut constraints, &columns);

    Ok(Table {
        name,
        columns,
        constraints,
    })
}

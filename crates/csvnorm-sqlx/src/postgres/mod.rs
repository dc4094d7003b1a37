use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Postgres, Row, ValueRef};
use tokio::sync::Mutex;

use csvnorm_core::{
    Constraint, DatabaseSchema, Dialect, NativeType, Result, SCHEMA_VERSION, Schema, Table, Value,
};

use crate::options::IntrospectOptions;
use crate::session::{Session, db_error, decode_error};

mod mapper;
mod queries;

/// Session over a single Postgres connection.
#[derive(Debug)]
pub struct PostgresSession {
    conn: Mutex<PgConnection>,
}

impl PostgresSession {
    /// Connect to `url` with the session time zone set to UTC.
    ///
    /// Timestamps are exchanged as naive UTC values, so `timestamptz` columns
    /// only round trip when the server reads them back in UTC.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = PgConnectOptions::from_str(url).map_err(db_error)?;
        let mut conn = options.connect().await.map_err(db_error)?;
        sqlx::query("SET TIME ZONE 'UTC'")
            .execute(&mut conn)
            .await
            .map_err(db_error)?;
        tracing::debug!(event = "postgres_connected", time_zone = "UTC");
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection opened elsewhere. Its time zone is left as is.
    pub fn from_connection(conn: PgConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
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
impl Session for PostgresSession {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        introspect(&mut conn, opts).await
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
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

fn decode_value(row: &PgRow, index: usize, native: NativeType) -> Result<Value> {
    let raw = row.try_get_raw(index).map_err(db_error)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let decoded = match native {
        NativeType::Integer => row
            .try_get::<i64, _>(index)
            .or_else(|_| row.try_get::<i32, _>(index).map(i64::from))
            .or_else(|_| row.try_get::<i16, _>(index).map(i64::from))
            .map(Value::Int),
        NativeType::Float => row
            .try_get::<f64, _>(index)
            .or_else(|_| row.try_get::<f32, _>(index).map(f64::from))
            .map(Value::Float),
        NativeType::Boolean => row.try_get::<bool, _>(index).map(Value::Bool),
        NativeType::Date => row.try_get::<NaiveDate, _>(index).map(Value::Date),
        NativeType::Timestamp => row
            .try_get::<NaiveDateTime, _>(index)
            .or_else(|_| {
                row.try_get::<DateTime<Utc>, _>(index)
                    .map(|value| value.naive_utc())
            })
            .map(Value::Timestamp),
        NativeType::Text | NativeType::Other => row.try_get::<String, _>(index).map(Value::Text),
    };

    decoded.map_err(|err| decode_error(index, native, err))
}

/// Introspect a Postgres database according to the provided options.
pub async fn introspect(
    conn: &mut PgConnection,
    opts: &IntrospectOptions,
) -> Result<DatabaseSchema> {
    let database = queries::fetch_database_name(conn).await?;
    let schemas = opts.filter_schemas(queries::list_schemas(conn).await?);

    let mut schema_items = Vec::new();
    for schema_name in schemas {
        let mut tables = Vec::new();
        for table_name in queries::list_tables_in_schema(conn, &schema_name).await? {
            tables.push(introspect_table(conn, &schema_name, table_name).await?);
        }
        tracing::debug!(
            event = "postgres_introspected",
            schema = %schema_name,
            tables = tables.len()
        );
        schema_items.push(Schema {
            name: schema_name,
            tables,
        });
    }

    Ok(DatabaseSchema {
        schema_version: SCHEMA_VERSION.to_string(),
        engine: "postgres".to_string(),
        database: Some(database),
        schemas: schema_items,
    })
}

async fn introspect_table(conn: &mut PgConnection, schema: &str, name: String) -> Result<Table> {
    let columns = mapper::map_columns(queries::list_columns(conn, schema, &name).await?);

    let raw_pk = queries::list_key_constraints(conn, schema, &name, "p").await?;
    let raw_uniques = queries::list_key_constraints(conn, schema, &name, "u").await?;
    let raw_indexes = queries::list_unique_indexes(conn, schema, &name).await?;
    let raw_fks = queries::list_foreign_keys(conn, schema, &name).await?;

    let mut constraints = Vec::new();
    if let Some(pk) = mapper::map_primary_key(raw_pk) {
        constraints.push(Constraint::PrimaryKey(pk));
    }
    let mut uniques = mapper::map_unique_constraints(raw_uniques);
    let indexes = mapper::map_unique_indexes(raw_indexes, &uniques);
    uniques.extend(indexes);
    constraints.extend(uniques.into_iter().map(Constraint::Unique));
    constraints.extend(
        mapper::map_foreign_keys(raw_fks)
            .into_iter()
            .map(Constraint::ForeignKey),
    );
    mapper::sort_constraints(&mut constraints);

    Ok(Table {
        name,
        columns,
        constraints,
    })
}

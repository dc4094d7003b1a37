use sqlx::{FromRow, SqliteConnection};

use csvnorm_core::Result;

use crate::session::db_error;

pub async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select name
        from sqlite_master
        where type = 'table'
          and name not like 'sqlite_%'
        order by name
        "#,
    )
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, FromRow)]
pub struct RawColumn {
    pub cid: i64,
    pub name: String,
    pub declared: String,
    pub not_null: i64,
    pub default_value: Option<String>,
    /// 1-based position in the primary key, 0 when not part of it.
    pub pk: i64,
}

pub async fn list_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<RawColumn>> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          cid,
          name,
          type as declared,
          "notnull" as not_null,
          dflt_value as default_value,
          pk
        from pragma_table_info(?1)
        order by cid
        "#,
    )
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, FromRow)]
pub struct RawForeignKey {
    pub id: i64,
    pub referenced_table: String,
    pub column_name: String,
    /// NULL when the key references the parent's primary key implicitly.
    pub referenced_column: Option<String>,
    pub on_update: String,
    pub on_delete: String,
}

pub async fn list_foreign_keys(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<RawForeignKey>> {
    sqlx::query_as::<_, RawForeignKey>(
        r#"
        select
          id,
          "table" as referenced_table,
          "from" as column_name,
          "to" as referenced_column,
          on_update,
          on_delete
        from pragma_foreign_key_list(?1)
        order by id, seq
        "#,
    )
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, FromRow)]
pub struct RawIndex {
    pub name: String,
    pub is_unique: i64,
    /// `c` for CREATE INDEX, `u` for UNIQUE constraints, `pk` for the key.
    pub origin: String,
    pub partial: i64,
}

pub async fn list_indexes(conn: &mut SqliteConnection, table: &str) -> Result<Vec<RawIndex>> {
    sqlx::query_as::<_, RawIndex>(
        r#"
        select
          name,
          "unique" as is_unique,
          origin,
          "partial" as partial
        from pragma_index_list(?1)
        order by name
        "#,
    )
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

/// Indexed columns in index order. Expression columns come back as `None`.
pub async fn list_index_columns(
    conn: &mut SqliteConnection,
    index: &str,
) -> Result<Vec<Option<String>>> {
    sqlx::query_scalar::<_, Option<String>>(
        r#"
        select name
        from pragma_index_info(?1)
        order by seqno
        "#,
    )
    .bind(index)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

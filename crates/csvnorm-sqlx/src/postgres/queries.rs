use sqlx::{FromRow, PgConnection};

use csvnorm_core::Result;

use crate::session::db_error;

pub async fn fetch_database_name(conn: &mut PgConnection) -> Result<String> {
    sqlx::query_scalar::<_, String>("select current_database()::text")
        .fetch_one(conn)
        .await
        .map_err(db_error)
}

pub async fn list_schemas(conn: &mut PgConnection) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select nspname::text
        from pg_namespace
        order by nspname
        "#,
    )
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

/// Ordinary and partitioned tables of `schema`.
pub async fn list_tables_in_schema(conn: &mut PgConnection, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select c.relname::text
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1
          and c.relkind in ('r','p')
        order by c.relname
        "#,
    )
    .bind(schema)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, FromRow)]
pub struct RawColumn {
    pub ordinal_position: i16,
    pub name: String,
    pub data_type: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub comment: Option<String>,
}

pub async fn list_columns(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<RawColumn>> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          a.attnum as ordinal_position,
          a.attname::text as name,
          pg_catalog.format_type(a.atttypid, a.atttypmod) as data_type,
          t.typname::text as udt_name,
          (not a.attnotnull) as is_nullable,
          pg_get_expr(ad.adbin, ad.adrelid) as default_value,
          pg_catalog.col_description(a.attrelid, a.attnum) as comment
        from pg_attribute a
        join pg_class c on c.oid = a.attrelid
        join pg_namespace n on n.oid = c.relnamespace
        join pg_type t on t.oid = a.atttypid
        left join pg_attrdef ad on ad.adrelid = a.attrelid and ad.adnum = a.attnum
        where n.nspname = $1
          and c.relname = $2
          and a.attnum > 0
          and not a.attisdropped
        order by a.attnum
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

/// Primary key or unique constraint, depending on the `contype` asked for.
#[derive(Debug, FromRow)]
pub struct RawKeyConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

pub async fn list_key_constraints(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
    contype: &str,
) -> Result<Vec<RawKeyConstraint>> {
    sqlx::query_as::<_, RawKeyConstraint>(
        r#"
        select
          con.conname::text as name,
          array_agg(att.attname::text order by ord.ordinality) as columns
        from pg_constraint con
        join pg_class rel on rel.oid = con.conrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join unnest(con.conkey) with ordinality as ord(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = ord.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and con.contype = $3::"char"
        group by con.conname
        order by con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .bind(contype)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

/// Unique indexes created with `CREATE UNIQUE INDEX`, reported as
/// `RawKeyConstraint` under the index name. Partial, expression and
/// constraint-backed indexes are left out.
pub async fn list_unique_indexes(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<RawKeyConstraint>> {
    sqlx::query_as::<_, RawKeyConstraint>(
        r#"
        select
          idx.relname::text as name,
          array_agg(att.attname::text order by k.ordinality) as columns
        from pg_index i
        join pg_class rel on rel.oid = i.indrelid
        join pg_namespace nsp on nsp.oid = rel.relnamespace
        join pg_class idx on idx.oid = i.indexrelid
        join unnest(i.indkey::int2[]) with ordinality as k(attnum, ordinality) on true
        join pg_attribute att on att.attrelid = rel.oid and att.attnum = k.attnum
        where nsp.nspname = $1
          and rel.relname = $2
          and i.indisunique
          and not i.indisprimary
          and i.indpred is null
          and i.indexprs is null
          and k.ordinality <= i.indnkeyatts
          and not exists (
            select 1 from pg_constraint con where con.conindid = i.indexrelid
          )
        group by idx.relname
        order by idx.relname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, FromRow)]
pub struct RawForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_update_code: String,
    pub on_delete_code: String,
}

pub async fn list_foreign_keys(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<RawForeignKey>> {
    sqlx::query_as::<_, RawForeignKey>(
        r#"
        select
          con.conname::text as name,
          array_agg(src_att.attname::text order by k.ordinality) as columns,
          ref_nsp.nspname::text as referenced_schema,
          ref_rel.relname::text as referenced_table,
          array_agg(ref_att.attname::text order by k.ordinality) as referenced_columns,
          con.confupdtype::text as on_update_code,
          con.confdeltype::text as on_delete_code
        from pg_constraint con
        join pg_class src_rel on src_rel.oid = con.conrelid
        join pg_namespace src_nsp on src_nsp.oid = src_rel.relnamespace
        join pg_class ref_rel on ref_rel.oid = con.confrelid
        join pg_namespace ref_nsp on ref_nsp.oid = ref_rel.relnamespace
        join unnest(con.conkey, con.confkey) with ordinality as k(src_attnum, ref_attnum, ordinality) on true
        join pg_attribute src_att on src_att.attrelid = src_rel.oid and src_att.attnum = k.src_attnum
        join pg_attribute ref_att on ref_att.attrelid = ref_rel.oid and ref_att.attnum = k.ref_attnum
        where src_nsp.nspname = $1
          and src_rel.relname = $2
          and con.contype = 'f'
        group by
          con.conname, ref_nsp.nspname, ref_rel.relname,
          con.confupdtype, con.confdeltype
        order by con.conname
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

//! SQL text for the denormalising read, the natural-key lookups and inserts.
//!
//! Statements are plain strings plus positional placeholders so that any
//! storage layer can run them; the builders never touch a connection.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::naming::ColumnTidier;
use crate::resolve::{
    MappedForeignKey, ensure_distinct_labels, find_natural_key, resolve_foreign_keys,
};
use crate::schema::{Column, DatabaseSchema, TableName};
use crate::types::NativeType;

/// SQL flavour of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Positional placeholder, 1-based.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Postgres => format!("${index}"),
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified(table: &TableName) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.name))
}

/// Column reference as read back. Types without a native counterpart travel
/// as text.
fn select_expr(qualifier: Option<&str>, column: &str, native: NativeType) -> String {
    let expr = match qualifier {
        Some(qualifier) => format!("{}.{}", quote_ident(qualifier), quote_ident(column)),
        None => quote_ident(column),
    };
    if native == NativeType::Other {
        format!("CAST({expr} AS TEXT)")
    } else {
        expr
    }
}

/// Knobs for the denormalising read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenormaliseOptions {
    /// Leave the primary key out when the table has a natural key of its own.
    pub omit_surrogate_key: bool,
}

/// One projected column of the denormalised output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    /// Flat column name (header label).
    pub label: String,
    /// Type used to decode the projected value.
    pub native: NativeType,
    /// Source column in the table, for mapped foreign keys the FK column.
    pub source: String,
    /// True when the value comes from a joined lookup table.
    pub denormalised: bool,
}

/// Read query over a table with every mapped foreign key joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenormaliseQuery {
    pub table: TableName,
    pub sql: String,
    pub columns: Vec<OutputColumn>,
}

impl DenormaliseQuery {
    /// Ordered output labels, one per projected column.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.label.clone()).collect()
    }

    pub fn column_types(&self) -> Vec<NativeType> {
        self.columns.iter().map(|column| column.native).collect()
    }
}

/// Build the single-statement read that replaces foreign key ids with the
/// natural key of the referenced row.
///
/// The projection follows column declaration order. Non-nullable foreign keys
/// use an inner join, nullable ones a left join so rows without a reference
/// survive. Rows come back ordered by primary key.
pub fn build_denormalise_query(
    catalog: &DatabaseSchema,
    table_name: &TableName,
    tidier: &dyn ColumnTidier,
    options: &DenormaliseOptions,
) -> Result<DenormaliseQuery> {
    let table = catalog.require_table(table_name)?;
    let pk = table
        .primary_key()
        .filter(|pk| !pk.columns.is_empty())
        .ok_or_else(|| Error::Schema(format!("table {table_name} has no primary key")))?;
    let mapping = resolve_foreign_keys(catalog, table_name, tidier)?;

    let omit_pk = options.omit_surrogate_key && find_natural_key(table).is_some();

    let base = "t0";
    let mut projection = Vec::new();
    let mut joins = Vec::new();
    let mut columns = Vec::new();

    for column in &table.columns {
        if omit_pk && table.is_primary_key_column(&column.name) {
            continue;
        }

        match mapping.get(&column.name) {
            Some(mapped) => {
                let alias = format!("t{}", joins.len() + 1);
                joins.push(join_clause(base, &alias, mapped));
                projection.push(format!(
                    "{} AS {}",
                    select_expr(Some(&alias), &mapped.display_column, mapped.display_type),
                    quote_ident(&mapped.display_name)
                ));
                columns.push(OutputColumn {
                    label: mapped.display_name.clone(),
                    native: mapped.display_type,
                    source: column.name.clone(),
                    denormalised: true,
                });
            }
            None => {
                projection.push(format!(
                    "{} AS {}",
                    select_expr(Some(base), &column.name, column.column_type.native),
                    quote_ident(&column.name)
                ));
                columns.push(OutputColumn {
                    label: column.name.clone(),
                    native: column.column_type.native,
                    source: column.name.clone(),
                    denormalised: false,
                });
            }
        }
    }

    if columns.is_empty() {
        return Err(Error::Schema(format!(
            "table {table_name} has no columns to project"
        )));
    }
    ensure_distinct_labels(table_name, columns.iter().map(|column| column.label.as_str()))?;

    let order_by = pk
        .columns
        .iter()
        .map(|column| format!("{}.{}", quote_ident(base), quote_ident(column)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        projection.join(", "),
        qualified(table_name),
        quote_ident(base)
    );
    for join in joins {
        sql.push(' ');
        sql.push_str(&join);
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_by);

    Ok(DenormaliseQuery {
        table: table_name.clone(),
        sql,
        columns,
    })
}

fn join_clause(base: &str, alias: &str, mapped: &MappedForeignKey) -> String {
    let kind = if mapped.nullable { "LEFT JOIN" } else { "INNER JOIN" };
    format!(
        "{kind} {} AS {} ON {}.{} = {}.{}",
        qualified(&mapped.target),
        quote_ident(alias),
        quote_ident(alias),
        quote_ident(&mapped.target_id_column),
        quote_ident(base),
        quote_ident(&mapped.column)
    )
}

/// Point lookup of the referenced id by natural key, one placeholder.
pub fn lookup_sql(mapped: &MappedForeignKey, dialect: Dialect) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {} LIMIT 1",
        select_expr(None, &mapped.target_id_column, mapped.target_id_type),
        qualified(&mapped.target),
        select_expr(None, &mapped.display_column, mapped.display_type),
        dialect.placeholder(1)
    )
}

/// Every `(natural key, id)` pair of the referenced table.
pub fn lookup_all_sql(mapped: &MappedForeignKey) -> String {
    format!(
        "SELECT {}, {} FROM {}",
        select_expr(None, &mapped.display_column, mapped.display_type),
        select_expr(None, &mapped.target_id_column, mapped.target_id_type),
        qualified(&mapped.target)
    )
}

/// `INSERT` for the given columns, values bound in the same order.
///
/// On Postgres every value is cast to the declared column type: flat files
/// hand over text, and Postgres does not convert bound parameters implicitly.
pub fn insert_sql(table: &TableName, columns: &[&Column], dialect: Dialect) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", qualified(table));
    }

    let names = columns
        .iter()
        .map(|column| quote_ident(&column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let placeholder = dialect.placeholder(index + 1);
            let declared = column.column_type.data_type.trim();
            if dialect == Dialect::Postgres && !declared.is_empty() {
                format!("CAST({placeholder} AS {declared})")
            } else {
                placeholder
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        qualified(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SuffixTidier;
    use crate::testing::{column, foreign_key, primary_key, sample_catalog, unique};
    use crate::{Schema, Table};

    fn normalised() -> TableName {
        TableName::new("main", "normalised_table")
    }

    #[test]
    fn projects_display_column_in_place_of_fk() {
        let query = build_denormalise_query(
            &sample_catalog(),
            &normalised(),
            &SuffixTidier::default(),
            &DenormaliseOptions::default(),
        )
        .unwrap();

        assert_eq!(
            query.column_names(),
            vec!["id", "username", "name", "accounttype", "age", "valid", "nonk_id"]
        );
        assert_eq!(query.columns.len(), 7);
        assert_eq!(query.columns[3].native, NativeType::Text);
        assert!(query.columns[3].denormalised);
        assert!(query.sql.contains(
            r#"INNER JOIN "main"."lookup_table" AS "t1" ON "t1"."id" = "t0"."accounttype_id""#
        ));
        assert!(query.sql.contains(r#""t1"."description" AS "accounttype""#));
        assert!(query.sql.ends_with(r#"ORDER BY "t0"."id""#));
        assert!(!query.sql.contains("lookup_nonk_table"));
    }

    #[test]
    fn nullable_fk_uses_left_join() {
        let mut catalog = sample_catalog();
        catalog.schemas[0].tables[0].columns[3].is_nullable = true;

        let query = build_denormalise_query(
            &catalog,
            &normalised(),
            &SuffixTidier::default(),
            &DenormaliseOptions::default(),
        )
        .unwrap();
        assert!(query.sql.contains(r#"LEFT JOIN "main"."lookup_table""#));
    }

    #[test]
    fn omits_surrogate_key_when_natural_key_exists() {
        let options = DenormaliseOptions {
            omit_surrogate_key: true,
        };
        let query = build_denormalise_query(
            &sample_catalog(),
            &normalised(),
            &SuffixTidier::default(),
            &options,
        )
        .unwrap();
        assert_eq!(query.column_names()[0], "username");

        let lookup = build_denormalise_query(
            &sample_catalog(),
            &TableName::new("main", "lookup_nonk_table"),
            &SuffixTidier::default(),
            &options,
        )
        .unwrap();
        assert_eq!(lookup.column_names(), vec!["id", "description"]);
    }

    #[test]
    fn table_without_primary_key_is_rejected() {
        let mut catalog = sample_catalog();
        catalog.schemas[0].tables[0]
            .constraints
            .retain(|constraint| !matches!(constraint, crate::Constraint::PrimaryKey(_)));

        let err = build_denormalise_query(
            &catalog,
            &normalised(),
            &SuffixTidier::default(),
            &DenormaliseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema(message) if message.contains("no primary key")));
    }

    #[test]
    fn colliding_labels_are_rejected() {
        let mut catalog = sample_catalog();
        catalog.schemas[0].tables[0]
            .columns
            .push(column(8, "accounttype", NativeType::Text, true));

        let err = build_denormalise_query(
            &catalog,
            &normalised(),
            &SuffixTidier::default(),
            &DenormaliseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema(message) if message.contains("accounttype")));
    }

    #[test]
    fn two_keys_to_same_lookup_get_their_own_aliases() {
        let shipment = Table {
            name: "shipment".to_string(),
            columns: vec![
                column(1, "id", NativeType::Integer, false),
                column(2, "origin_id", NativeType::Integer, false),
                column(3, "destination_id", NativeType::Integer, true),
            ],
            constraints: vec![
                primary_key("id"),
                foreign_key("origin_id", "port", "id"),
                foreign_key("destination_id", "port", "id"),
            ],
        };
        let port = Table {
            name: "port".to_string(),
            columns: vec![
                column(1, "id", NativeType::Integer, false),
                column(2, "code", NativeType::Text, false),
            ],
            constraints: vec![primary_key("id"), unique("code")],
        };
        let mut catalog = sample_catalog();
        catalog.schemas = vec![Schema {
            name: "main".to_string(),
            tables: vec![shipment, port],
        }];

        let query = build_denormalise_query(
            &catalog,
            &TableName::new("main", "shipment"),
            &SuffixTidier::default(),
            &DenormaliseOptions::default(),
        )
        .unwrap();

        assert_eq!(query.column_names(), vec!["id", "origin", "destination"]);
        assert!(query.sql.contains(r#"INNER JOIN "main"."port" AS "t1""#));
        assert!(query.sql.contains(r#"LEFT JOIN "main"."port" AS "t2""#));
    }

    #[test]
    fn other_types_are_read_and_written_as_text() {
        let mut tag = column(1, "tag", NativeType::Other, false);
        tag.column_type.data_type = "uuid".to_string();
        let table = TableName::new("public", "item");

        assert_eq!(
            insert_sql(&table, &[&tag], Dialect::Postgres),
            r#"INSERT INTO "public"."item" ("tag") VALUES (CAST($1 AS uuid))"#
        );
        assert_eq!(
            select_expr(Some("t0"), "tag", NativeType::Other),
            r#"CAST("t0"."tag" AS TEXT)"#
        );

        let age = column(2, "age", NativeType::Integer, false);
        assert_eq!(
            insert_sql(&table, &[&tag, &age], Dialect::Postgres),
            r#"INSERT INTO "public"."item" ("tag", "age") VALUES (CAST($1 AS uuid), CAST($2 AS INTEGER))"#
        );
    }

    #[test]
    fn lookup_and_insert_statements() {
        let catalog = sample_catalog();
        let mapping =
            resolve_foreign_keys(&catalog, &normalised(), &SuffixTidier::default()).unwrap();
        let mapped = mapping.get("accounttype_id").unwrap();

        assert_eq!(
            lookup_sql(mapped, Dialect::Postgres),
            r#"SELECT "id" FROM "main"."lookup_table" WHERE "description" = $1 LIMIT 1"#
        );
        let table = catalog.table("main", "normalised_table").unwrap();
        let columns = [table.column("id").unwrap(), table.column("name").unwrap()];
        assert_eq!(
            insert_sql(&normalised(), &columns, Dialect::Sqlite),
            r#"INSERT INTO "main"."normalised_table" ("id", "name") VALUES (?1, ?2)"#
        );
        assert_eq!(quote_ident(r#"odd"name"#), r#""odd""name""#);
    }
}

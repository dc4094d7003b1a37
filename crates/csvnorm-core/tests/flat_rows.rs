use csvnorm_core::{
    CoerceOptions, Column, ColumnType, Constraint, DatabaseSchema, DenormaliseOptions, Error,
    FkAction, ForeignKey, NativeType, PrimaryKey, Schema, SuffixTidier, Table, TableName,
    UniqueConstraint, Value, build_denormalise_query, make_row_cleaner, make_type_coercer,
    resolve_foreign_keys, text_row,
};

fn col(position: i16, name: &str, native: NativeType, nullable: bool) -> Column {
    Column::new(position, name, ColumnType::new(native.to_string(), native), nullable)
}

fn pk(column: &str) -> Constraint {
    Constraint::PrimaryKey(PrimaryKey {
        name: None,
        columns: vec![column.to_string()],
    })
}

fn fk(column: &str, table: &str) -> Constraint {
    Constraint::ForeignKey(ForeignKey {
        name: None,
        columns: vec![column.to_string()],
        referenced_schema: "public".to_string(),
        referenced_table: table.to_string(),
        referenced_columns: vec!["id".to_string()],
        on_update: FkAction::NoAction,
        on_delete: FkAction::Cascade,
    })
}

fn catalog() -> DatabaseSchema {
    let customer = Table {
        name: "customer".to_string(),
        columns: vec![
            col(1, "id", NativeType::Integer, false),
            col(2, "email", NativeType::Text, false),
        ],
        constraints: vec![
            pk("id"),
            Constraint::Unique(UniqueConstraint {
                name: Some("customer_email_key".to_string()),
                columns: vec!["email".to_string()],
            }),
        ],
    };
    let status = Table {
        name: "status".to_string(),
        columns: vec![
            col(1, "id", NativeType::Integer, false),
            col(2, "label", NativeType::Text, false),
        ],
        constraints: vec![pk("id")],
    };
    let orders = Table {
        name: "orders".to_string(),
        columns: vec![
            col(1, "id", NativeType::Integer, false),
            col(2, "customer_id", NativeType::Integer, false),
            col(3, "status", NativeType::Integer, true),
            col(4, "paid", NativeType::Boolean, false),
            col(5, "placed_on", NativeType::Date, false),
            col(6, "note", NativeType::Text, true),
        ],
        constraints: vec![pk("id"), fk("customer_id", "customer"), fk("status", "status")],
    };

    DatabaseSchema {
        schema_version: csvnorm_core::SCHEMA_VERSION.to_string(),
        engine: "postgres".to_string(),
        database: Some("shop".to_string()),
        schemas: vec![Schema {
            name: "public".to_string(),
            tables: vec![customer, orders, status],
        }],
    }
}

fn orders() -> TableName {
    TableName::new("public", "orders")
}

#[test]
fn resolver_skips_lookup_without_natural_key() {
    let mapping = resolve_foreign_keys(&catalog(), &orders(), &SuffixTidier::default()).unwrap();

    let names: Vec<&str> = mapping.iter().map(|entry| entry.display_name.as_str()).collect();
    assert_eq!(names, vec!["customer"]);
    assert!(mapping.get("status").is_none());
}

#[test]
fn column_names_match_projection() {
    let query = build_denormalise_query(
        &catalog(),
        &orders(),
        &SuffixTidier::default(),
        &DenormaliseOptions::default(),
    )
    .unwrap();

    assert_eq!(
        query.column_names(),
        vec!["id", "customer", "status", "paid", "placed_on", "note"]
    );
    let projected = query.sql.split(" FROM ").next().unwrap();
    assert_eq!(projected.matches(" AS ").count(), query.column_names().len());
    assert!(query.sql.contains(r#""t1"."email" AS "customer""#));
    assert!(query.sql.contains(r#""t0"."status" AS "status""#));
}

#[test]
fn clean_then_coerce_a_flat_row() {
    let catalog = catalog();
    let table = catalog.require_table(&orders()).unwrap();
    let cleaner = make_row_cleaner(table);
    let coercer = make_type_coercer(table, CoerceOptions::default());

    let flat = text_row([
        ("customer", "ada@example.com"),
        ("status", ""),
        ("paid", "yes"),
        ("placed_on", "2024-03-01"),
        ("note", ""),
    ]);

    let row = coercer.coerce(&cleaner.clean(&flat)).unwrap();
    assert!(!row.contains_key("status"));
    assert!(!row.contains_key("note"));
    assert_eq!(row["paid"], Value::Bool(true));
    assert_eq!(row["customer"], Value::from("ada@example.com"));
    assert_eq!(row["placed_on"].to_csv(), "2024-03-01");
}

#[test]
fn bad_date_is_a_coercion_error() {
    let catalog = catalog();
    let table = catalog.require_table(&orders()).unwrap();
    let coercer = make_type_coercer(table, CoerceOptions::default());

    let err = coercer
        .coerce(&text_row([("placed_on", "yesterday")]))
        .unwrap_err();
    assert!(matches!(err, Error::Coercion { ref column, .. } if column == "placed_on"));
    assert!(err.is_row_error());
}

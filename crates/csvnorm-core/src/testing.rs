//! Catalog fixtures shared by unit tests.

use crate::constraints::{Constraint, FkAction, ForeignKey, PrimaryKey, UniqueConstraint};
use crate::schema::{Column, DatabaseSchema, Schema, Table};
use crate::types::{ColumnType, NativeType};

pub fn column(position: i16, name: &str, native: NativeType, nullable: bool) -> Column {
    let declared = match native {
        NativeType::Integer => "INTEGER",
        NativeType::Float => "REAL",
        NativeType::Text => "TEXT",
        NativeType::Boolean => "BOOLEAN",
        NativeType::Date => "DATE",
        NativeType::Timestamp => "DATETIME",
        NativeType::Other => "BLOB",
    };
    Column::new(position, name, ColumnType::new(declared, native), nullable)
}

pub fn primary_key(column: &str) -> Constraint {
    Constraint::PrimaryKey(PrimaryKey {
        name: None,
        columns: vec![column.to_string()],
    })
}

pub fn unique(column: &str) -> Constraint {
    Constraint::Unique(UniqueConstraint {
        name: None,
        columns: vec![column.to_string()],
    })
}

pub fn foreign_key(column: &str, table: &str, target: &str) -> Constraint {
    Constraint::ForeignKey(ForeignKey {
        name: None,
        columns: vec![column.to_string()],
        referenced_schema: "main".to_string(),
        referenced_table: table.to_string(),
        referenced_columns: vec![target.to_string()],
        on_update: FkAction::NoAction,
        on_delete: FkAction::NoAction,
    })
}

/// Two lookup tables (one with a natural key, one without) and a table
/// referencing both.
pub fn sample_catalog() -> DatabaseSchema {
    let lookup_nonk = Table {
        name: "lookup_nonk_table".to_string(),
        columns: vec![
            column(1, "id", NativeType::Integer, false),
            column(2, "description", NativeType::Text, false),
        ],
        constraints: vec![primary_key("id")],
    };

    let lookup = Table {
        name: "lookup_table".to_string(),
        columns: vec![
            column(1, "id", NativeType::Integer, false),
            column(2, "description", NativeType::Text, false),
        ],
        constraints: vec![primary_key("id"), unique("description")],
    };

    let normalised = Table {
        name: "normalised_table".to_string(),
        columns: vec![
            column(1, "id", NativeType::Integer, false),
            column(2, "username", NativeType::Text, false),
            column(3, "name", NativeType::Text, true),
            column(4, "accounttype_id", NativeType::Integer, false),
            column(5, "age", NativeType::Integer, false),
            column(6, "valid", NativeType::Boolean, false),
            column(7, "nonk_id", NativeType::Integer, true),
        ],
        constraints: vec![
            primary_key("id"),
            unique("username"),
            foreign_key("accounttype_id", "lookup_table", "id"),
            foreign_key("nonk_id", "lookup_nonk_table", "id"),
        ],
    };

    DatabaseSchema {
        schema_version: crate::SCHEMA_VERSION.to_string(),
        engine: "sqlite".to_string(),
        database: None,
        schemas: vec![Schema {
            name: "main".to_string(),
            tables: vec![normalised, lookup, lookup_nonk],
        }],
    }
}

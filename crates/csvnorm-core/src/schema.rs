use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraint, ForeignKey, PrimaryKey, UniqueConstraint};
use crate::error::{Error, Result};
use crate::types::ColumnType;

/// Catalog snapshot of a database: every table the transformers may need to
/// look at, including the lookup tables behind foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseSchema {
    /// Contract version for this catalog format.
    pub schema_version: String,
    /// Database engine identifier (`sqlite`, `postgres`).
    pub engine: String,
    /// Database name when available.
    pub database: Option<String>,
    /// Namespaces captured from the database.
    pub schemas: Vec<Schema>,
}

impl DatabaseSchema {
    /// Look up a table by namespace and name.
    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.schemas
            .iter()
            .find(|item| item.name == schema)
            .and_then(|item| item.tables.iter().find(|table| table.name == name))
    }

    /// Look up a table, failing with a schema error when it is absent.
    pub fn require_table(&self, name: &TableName) -> Result<&Table> {
        self.table(&name.schema, &name.name)
            .ok_or_else(|| Error::Schema(format!("table not found in catalog: {name}")))
    }
}

/// A namespace containing tables (`main` for SQLite, `public` by default for
/// Postgres).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
}

/// Table descriptor: columns in declaration order plus table constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub constraints: Vec<Constraint>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.constraints.iter().find_map(|constraint| match constraint {
            Constraint::PrimaryKey(pk) => Some(pk),
            _ => None,
        })
    }

    pub fn is_primary_key_column(&self, column: &str) -> bool {
        self.primary_key()
            .is_some_and(|pk| pk.columns.iter().any(|item| item == column))
    }

    pub fn unique_constraints(&self) -> impl Iterator<Item = &UniqueConstraint> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            Constraint::Unique(unique) => Some(unique),
            _ => None,
        })
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.constraints.iter().filter_map(|constraint| match constraint {
            Constraint::ForeignKey(fk) => Some(fk),
            _ => None,
        })
    }

    /// The single-column foreign key whose source is `column`, if any.
    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys()
            .find(|fk| fk.single_column() == Some(column))
    }

    /// True when `column` sits in any foreign key, single or composite.
    pub fn is_foreign_key_column(&self, column: &str) -> bool {
        self.foreign_keys()
            .any(|fk| fk.columns.iter().any(|item| item == column))
    }
}

/// Column metadata for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub ordinal_position: i16,
    pub name: String,
    pub column_type: ColumnType,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

impl Column {
    pub fn new(
        ordinal_position: i16,
        name: impl Into<String>,
        column_type: ColumnType,
        is_nullable: bool,
    ) -> Self {
        Self {
            ordinal_position,
            name: name.into(),
            column_type,
            is_nullable,
            default: None,
            comment: None,
        }
    }
}

/// Qualified address of a table inside a catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.table` or a bare `table`, which lands in `default_schema`.
    pub fn parse(text: &str, default_schema: &str) -> Self {
        match text.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() => {
                Self::new(schema, name)
            }
            _ => Self::new(default_schema, text),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

//! Discovery of the foreign keys that can be shown as human-readable values.
//!
//! A foreign key qualifies when its target table has a *natural key*: a
//! column covered by a single-column unique constraint that is not part of
//! the target's primary key. Foreign keys to tables without one stay raw ids.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::naming::ColumnTidier;
use crate::schema::{Column, DatabaseSchema, Table, TableName};
use crate::types::NativeType;

/// A foreign key that will be denormalised through its target's natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedForeignKey {
    /// Foreign key column in the source table.
    pub column: String,
    /// Whether the source column accepts NULL.
    pub nullable: bool,
    pub target: TableName,
    /// Column of the target the foreign key points at.
    pub target_id_column: String,
    pub target_id_type: NativeType,
    /// Natural key column of the target.
    pub display_column: String,
    pub display_type: NativeType,
    /// Flat column name used in place of `column`.
    pub display_name: String,
}

/// Mapped foreign keys of one table, in column declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForeignKeyMapping {
    entries: Vec<MappedForeignKey>,
}

impl ForeignKeyMapping {
    pub fn get(&self, column: &str) -> Option<&MappedForeignKey> {
        self.entries.iter().find(|entry| entry.column == column)
    }

    pub fn by_display_name(&self, display_name: &str) -> Option<&MappedForeignKey> {
        self.entries
            .iter()
            .find(|entry| entry.display_name == display_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedForeignKey> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flat name of every column of `table`, in declaration order: the display
    /// name for mapped foreign keys, the column name otherwise.
    pub fn flat_names<'a>(&'a self, table: &'a Table) -> impl Iterator<Item = &'a str> + 'a {
        table.columns.iter().map(move |column| match self.get(&column.name) {
            Some(entry) => entry.display_name.as_str(),
            None => column.name.as_str(),
        })
    }
}

/// The natural key of `table`: the first column, in declaration order, with a
/// single-column unique constraint and no part in the primary key.
pub fn find_natural_key(table: &Table) -> Option<&Column> {
    let unique_columns: BTreeSet<&str> = table
        .unique_constraints()
        .filter_map(|unique| unique.single_column())
        .collect();

    table.columns.iter().find(|column| {
        unique_columns.contains(column.name.as_str()) && !table.is_primary_key_column(&column.name)
    })
}

/// Build the foreign key mapping for `table_name`.
///
/// Fails only when the table, or a table one of its foreign keys references,
/// is missing from the catalog.
pub fn resolve_foreign_keys(
    catalog: &DatabaseSchema,
    table_name: &TableName,
    tidier: &dyn ColumnTidier,
) -> Result<ForeignKeyMapping> {
    let table = catalog.require_table(table_name)?;
    let mut entries = Vec::new();

    for column in &table.columns {
        let Some(fk) = table.foreign_key_for(&column.name) else {
            continue;
        };

        let target_name = TableName::new(&fk.referenced_schema, &fk.referenced_table);
        let target = catalog.table(&target_name.schema, &target_name.name).ok_or_else(|| {
            Error::Schema(format!(
                "foreign key {}.{} references missing table {target_name}",
                table_name, column.name
            ))
        })?;

        let Some(natural_key) = find_natural_key(target) else {
            tracing::debug!(
                event = "fk_left_raw",
                table = %table_name,
                column = %column.name,
                target = %target_name,
            );
            continue;
        };

        let target_id_column = target_id_column(fk.referenced_columns.first(), target)
            .ok_or_else(|| {
                Error::Schema(format!(
                    "cannot determine referenced column of {}.{} in {target_name}",
                    table_name, column.name
                ))
            })?;
        let target_id_type = target
            .column(&target_id_column)
            .map(|col| col.column_type.native)
            .ok_or_else(|| {
                Error::Schema(format!(
                    "referenced column not found: {target_name}.{target_id_column}"
                ))
            })?;

        entries.push(MappedForeignKey {
            column: column.name.clone(),
            nullable: column.is_nullable,
            target: target_name,
            target_id_column,
            target_id_type,
            display_column: natural_key.name.clone(),
            display_type: natural_key.column_type.native,
            display_name: tidier.tidy(&column.name),
        });
    }

    Ok(ForeignKeyMapping { entries })
}

fn target_id_column(referenced: Option<&String>, target: &Table) -> Option<String> {
    if let Some(column) = referenced {
        return Some(column.clone());
    }
    match target.primary_key()?.columns.as_slice() {
        [column] => Some(column.clone()),
        _ => None,
    }
}

/// Check that flat column labels are unique, naming the first collision.
pub fn ensure_distinct_labels<'a>(
    table_name: &TableName,
    labels: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels {
        let count = seen.entry(label).or_insert(0);
        *count += 1;
        if *count > 1 {
            return Err(Error::Schema(format!(
                "column {label:?} appears more than once for {table_name}"
            )));
        }
    }
    Ok(())
}

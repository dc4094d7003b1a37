use std::collections::BTreeSet;

use crate::schema::Table;
use crate::value::FlatRow;

/// Drops empty strings on nullable columns.
///
/// A flat file cannot tell NULL from an empty cell, so an empty cell in a
/// nullable column is treated as an omitted field and the storage default or
/// NULL applies. Empty cells in non-nullable columns are kept and fail later.
#[derive(Debug, Clone)]
pub struct RowCleaner {
    nullable: BTreeSet<String>,
}

impl RowCleaner {
    pub fn clean(&self, row: &FlatRow) -> FlatRow {
        row.iter()
            .filter(|(key, value)| !(value.is_empty_text() && self.nullable.contains(*key)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

pub fn make_row_cleaner(table: &Table) -> RowCleaner {
    RowCleaner {
        nullable: table
            .columns
            .iter()
            .filter(|column| column.is_nullable)
            .map(|column| column.name.clone())
            .collect(),
    }
}

use std::collections::{BTreeMap, BTreeSet};

use csvnorm_core::{
    Column, ColumnType, Constraint, FkAction, ForeignKey, NativeType, PrimaryKey, UniqueConstraint,
};

use super::queries::{RawColumn, RawForeignKey, RawIndex};

pub const SQLITE_SCHEMA: &str = "main";

pub fn map_columns(raw: &[RawColumn]) -> Vec<Column> {
    raw.iter()
        .map(|col| {
            let mut column = Column::new(
                i16::try_from(col.cid + 1).unwrap_or(i16::MAX),
                col.name.clone(),
                ColumnType::new(col.declared.clone(), NativeType::from_sqlite_decl(&col.declared)),
                col.not_null == 0 && col.pk == 0,
            );
            column.default = col.default_value.clone();
            column
        })
        .collect()
}

pub fn map_primary_key(raw: &[RawColumn]) -> Option<PrimaryKey> {
    let mut key_columns: Vec<&RawColumn> = raw.iter().filter(|col| col.pk > 0).collect();
    if key_columns.is_empty() {
        return None;
    }
    key_columns.sort_by_key(|col| col.pk);
    Some(PrimaryKey {
        name: None,
        columns: key_columns.into_iter().map(|col| col.name.clone()).collect(),
    })
}

/// Unique constraint backed by `index`, if it is a full unique index over
/// plain columns that is not the primary key.
pub fn map_unique_index(
    index: &RawIndex,
    columns: Vec<Option<String>>,
) -> Option<UniqueConstraint> {
    if index.is_unique == 0 || index.partial != 0 || index.origin == "pk" {
        return None;
    }
    let columns: Option<Vec<String>> = columns.into_iter().collect();
    let columns = columns.filter(|columns| !columns.is_empty())?;
    let name = (index.origin == "c").then(|| index.name.clone());
    Some(UniqueConstraint { name, columns })
}

pub fn map_foreign_keys(raw: Vec<RawForeignKey>) -> Vec<ForeignKey> {
    let mut grouped: BTreeMap<i64, ForeignKey> = BTreeMap::new();
    let mut implicit_target: BTreeSet<i64> = BTreeSet::new();

    for row in raw {
        let fk = grouped.entry(row.id).or_insert_with(|| ForeignKey {
            name: None,
            columns: Vec::new(),
            referenced_schema: SQLITE_SCHEMA.to_string(),
            referenced_table: row.referenced_table.clone(),
            referenced_columns: Vec::new(),
            on_update: FkAction::from_sql_text(&row.on_update),
            on_delete: FkAction::from_sql_text(&row.on_delete),
        });
        fk.columns.push(row.column_name);
        match row.referenced_column {
            Some(column) => fk.referenced_columns.push(column),
            None => {
                implicit_target.insert(row.id);
            }
        }
    }

    grouped
        .into_iter()
        .map(|(id, mut fk)| {
            if implicit_target.contains(&id) {
                fk.referenced_columns.clear();
            }
            fk
        })
        .collect()
}

/// Primary key first, then unique constraints and foreign keys, each ordered
/// by the position of their first column.
pub fn sort_constraints(constraints: &mut [Constraint], columns: &[Column]) {
    let position = |name: Option<&String>| {
        name.and_then(|name| columns.iter().position(|column| &column.name == name))
            .unwrap_or(usize::MAX)
    };
    constraints.sort_by_key(|constraint| match constraint {
        Constraint::PrimaryKey(_) => (0, 0),
        Constraint::Unique(unique) => (1, position(unique.columns.first())),
        Constraint::ForeignKey(fk) => (2, position(fk.columns.first())),
    });
}

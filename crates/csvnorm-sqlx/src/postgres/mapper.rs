use csvnorm_core::{
    Column, ColumnType, Constraint, FkAction, ForeignKey, NativeType, PrimaryKey, UniqueConstraint,
};

use super::queries::{RawColumn, RawForeignKey, RawKeyConstraint};

pub fn map_columns(raw: Vec<RawColumn>) -> Vec<Column> {
    raw.into_iter()
        .map(|col| Column {
            ordinal_position: col.ordinal_position,
            name: col.name,
            column_type: ColumnType::new(col.data_type, NativeType::from_pg_udt(&col.udt_name)),
            is_nullable: col.is_nullable,
            default: col.default_value,
            comment: col.comment,
        })
        .collect()
}

pub fn map_primary_key(raw: Vec<RawKeyConstraint>) -> Option<PrimaryKey> {
    raw.into_iter().next().map(|pk| PrimaryKey {
        name: Some(pk.name),
        columns: pk.columns,
    })
}

pub fn map_unique_constraints(raw: Vec<RawKeyConstraint>) -> Vec<UniqueConstraint> {
    raw.into_iter()
        .map(|unique| UniqueConstraint {
            name: Some(unique.name),
            columns: unique.columns,
        })
        .collect()
}

/// Unique indexes become unique constraints unless a constraint already
/// covers the same columns.
pub fn map_unique_indexes(
    raw: Vec<RawKeyConstraint>,
    existing: &[UniqueConstraint],
) -> Vec<UniqueConstraint> {
    raw.into_iter()
        .filter(|index| !existing.iter().any(|unique| unique.columns == index.columns))
        .map(|index| UniqueConstraint {
            name: Some(index.name),
            columns: index.columns,
        })
        .collect()
}

pub fn map_foreign_keys(raw: Vec<RawForeignKey>) -> Vec<ForeignKey> {
    raw.into_iter()
        .map(|fk| ForeignKey {
            name: Some(fk.name),
            columns: fk.columns,
            referenced_schema: fk.referenced_schema,
            referenced_table: fk.referenced_table,
            referenced_columns: fk.referenced_columns,
            on_update: FkAction::from_pg_code(&fk.on_update_code),
            on_delete: FkAction::from_pg_code(&fk.on_delete_code),
        })
        .collect()
}

/// Primary key first, then unique constraints and foreign keys, each group
/// ordered by name.
pub fn sort_constraints(constraints: &mut [Constraint]) {
    constraints.sort_by(|left, right| {
        constraint_rank(left)
            .cmp(&constraint_rank(right))
            .then_with(|| constraint_name(left).cmp(&constraint_name(right)))
    });
}

fn constraint_rank(constraint: &Constraint) -> u8 {
    match constraint {
        Constraint::PrimaryKey(_) => 0,
        Constraint::Unique(_) => 1,
        Constraint::ForeignKey(_) => 2,
    }
}

fn constraint_name(constraint: &Constraint) -> Option<&str> {
    match constraint {
        Constraint::PrimaryKey(pk) => pk.name.as_deref(),
        Constraint::Unique(unique) => unique.name.as_deref(),
        Constraint::ForeignKey(fk) => fk.name.as_deref(),
    }
}

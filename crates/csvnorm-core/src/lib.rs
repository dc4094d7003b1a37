//! Core contracts for csvnorm.
//!
//! This crate defines the catalog types describing tables, columns and their
//! constraints, and the pure transformations between normalised rows (foreign
//! key ids) and flat rows (human-readable natural keys): foreign key
//! resolution, the denormalising query, the row cleaner and the type coercer.
//! Running statements is left to a storage layer such as `csvnorm-sqlx`.

pub mod clean;
pub mod coerce;
pub mod constraints;
pub mod error;
pub mod naming;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use clean::{RowCleaner, make_row_cleaner};
pub use coerce::{CoerceOptions, TypeCoercer, coerce_value, make_type_coercer};
pub use constraints::{Constraint, FkAction, ForeignKey, PrimaryKey, UniqueConstraint};
pub use error::{Error, Result};
pub use naming::{ColumnTidier, SuffixTidier};
pub use query::{
    DenormaliseOptions, DenormaliseQuery, Dialect, OutputColumn, build_denormalise_query,
    insert_sql, lookup_all_sql, lookup_sql, quote_ident,
};
pub use resolve::{
    ForeignKeyMapping, MappedForeignKey, ensure_distinct_labels, find_natural_key,
    resolve_foreign_keys,
};
pub use schema::{Column, DatabaseSchema, Schema, Table, TableName};
pub use types::{ColumnType, NativeType};
pub use validation::validate_schema;
pub use value::{FlatRow, ResolvedRow, Value, text_row};

/// Current contract version for catalog JSON files.
pub const SCHEMA_VERSION: &str = "0.1";

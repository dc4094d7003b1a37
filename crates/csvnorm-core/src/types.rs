use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declared and native type information for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnType {
    /// Type as declared in the database (e.g. `VARCHAR(40)`, `int4`).
    pub data_type: String,
    /// Value family used for decoding, coercion and binding.
    pub native: NativeType,
}

impl ColumnType {
    pub fn new(data_type: impl Into<String>, native: NativeType) -> Self {
        Self {
            data_type: data_type.into(),
            native,
        }
    }
}

/// Value family of a column, independent of the engine's spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    Timestamp,
    Other,
}

impl NativeType {
    /// Map a SQLite declared type using its affinity rules, refined for the
    /// boolean and date names that SQLite itself stores as numbers or text.
    pub fn from_sqlite_decl(decl: &str) -> Self {
        let upper = decl.to_ascii_uppercase();
        if upper.contains("BOOL") {
            NativeType::Boolean
        } else if upper.contains("DATETIME") || upper.contains("TIMESTAMP") {
            NativeType::Timestamp
        } else if upper.contains("DATE") {
            NativeType::Date
        } else if upper.contains("INT") {
            NativeType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            NativeType::Text
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            NativeType::Float
        } else {
            NativeType::Other
        }
    }

    /// Map a Postgres type name (`int4`, `varchar`, `timestamptz`, ...).
    ///
    /// `numeric` stays `Other` so exact decimals travel as text.
    pub fn from_pg_udt(udt: &str) -> Self {
        match udt {
            "int2" | "int4" | "int8" => NativeType::Integer,
            "float4" | "float8" => NativeType::Float,
            "text" | "varchar" | "bpchar" | "name" | "citext" => NativeType::Text,
            "bool" => NativeType::Boolean,
            "date" => NativeType::Date,
            "timestamp" | "timestamptz" => NativeType::Timestamp,
            _ => NativeType::Other,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeType::Integer => "integer",
            NativeType::Float => "float",
            NativeType::Text => "text",
            NativeType::Boolean => "boolean",
            NativeType::Date => "date",
            NativeType::Timestamp => "timestamp",
            NativeType::Other => "other",
        };
        f.write_str(name)
    }
}

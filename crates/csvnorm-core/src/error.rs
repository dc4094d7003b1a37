use thiserror::Error;

/// Core error type shared across csvnorm crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The table schema cannot be denormalised or renormalised as described:
    /// missing primary key, colliding output columns, dangling references.
    #[error("schema error: {0}")]
    Schema(String),
    /// A flat value cannot be converted to the declared column type.
    #[error("cannot coerce {value:?} in column {column} to {expected}")]
    Coercion {
        column: String,
        value: String,
        expected: String,
    },
    /// A display value has no matching row in the referenced table.
    #[error("no row in lookup for {column} (display column {display}) matching {value:?}")]
    Lookup {
        column: String,
        display: String,
        value: String,
    },
    /// Database error or session failure.
    #[error("database error: {0}")]
    Db(String),
    /// A requested feature is not supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// True for failures tied to one row's content rather than to the schema
    /// or the connection.
    pub fn is_row_error(&self) -> bool {
        matches!(self, Error::Coercion { .. } | Error::Lookup { .. })
    }
}

/// Convenience alias for results returned by csvnorm crates.
pub type Result<T> = std::result::Result<T, Error>;

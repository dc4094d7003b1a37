use serde::{Deserialize, Serialize};

use csvnorm_core::value::{DATE_FORMAT, TIMESTAMP_FORMAT};
use csvnorm_core::{CoerceOptions, DenormaliseOptions};

/// Options for [`crate::export_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub denormalise: DenormaliseOptions,
    pub date_format: String,
    pub timestamp_format: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            denormalise: DenormaliseOptions::default(),
            date_format: DATE_FORMAT.to_string(),
            timestamp_format: TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// Options for [`crate::import_table`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Record failing rows in the report and keep going instead of aborting.
    pub skip_invalid_rows: bool,
    /// Run every row through the pipeline without writing it.
    pub dry_run: bool,
    pub coerce: CoerceOptions,
    /// Load lookup tables once instead of querying per value.
    pub preload_lookups: bool,
}

/// Summary of an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: u64,
    pub bytes_written: u64,
}

/// A CSV record that was not imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line of the record in the input, header included.
    pub line: u64,
    pub error: String,
}

/// Summary of an import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub table: String,
    pub rows_read: u64,
    /// Rows written, or in a dry run the rows that passed every check.
    pub rows_inserted: u64,
    pub rejected: Vec<RejectedRow>,
    pub dry_run: bool,
}

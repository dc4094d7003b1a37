//! CSV transfer pipelines: export a table as a flat, human-readable CSV and
//! import such a CSV back into the normalised table.

pub mod errors;
pub mod export;
pub mod import;
pub mod model;

pub use errors::TransferError;
pub use export::export_table;
pub use import::import_table;
pub use model::{ExportOptions, ExportReport, ImportOptions, ImportReport, RejectedRow};

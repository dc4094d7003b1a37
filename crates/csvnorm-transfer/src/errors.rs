use thiserror::Error;

/// Errors emitted by the transfer pipelines.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Core(#[from] csvnorm_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// A row could not be imported and invalid rows are not being skipped.
    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: csvnorm_core::Error,
    },
}

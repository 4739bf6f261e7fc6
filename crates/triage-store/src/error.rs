use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sql file not found: {0}")]
    SqlNotFound(std::path::PathBuf),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

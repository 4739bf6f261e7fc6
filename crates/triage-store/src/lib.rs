//! Storage collaborators: DuckDB for extracting backlog rows, CSV for
//! persisting the classified table.

mod csv;
mod error;
pub use csv::write_csv;
pub use error::StoreError;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

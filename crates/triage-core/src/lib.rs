//! Core types shared by the triage crates: the category taxonomy, provider
//! identifiers, prompt formatting, and output table assembly.

pub mod formatter;
pub mod provider;
pub mod table;
pub mod taxonomy;

pub use formatter::TextFormatter;
pub use provider::ProviderId;
pub use table::{ColumnNamer, PredictionColumn, TableError};
pub use taxonomy::{Category, Taxonomy, TaxonomyError};

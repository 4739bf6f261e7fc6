//! CSV sink for the classified table.

use std::fs::File;
use std::path::Path;

use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::StoreError;

/// Write `batch` to `path` as comma-separated values with one header row.
///
/// Missing parent directories are created. An existing file is replaced.
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;

    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        path = %path.display(),
        "wrote csv"
    );
    Ok(())
}

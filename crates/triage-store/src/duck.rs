//! DuckDB extraction path for backlog items.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use duckdb::Connection;
use tracing::{debug, info};

use crate::StoreError;

/// DuckDB connection used to run the extraction query.
///
/// The query itself decides where the rows come from (`read_csv_auto`,
/// `read_parquet`, attached databases...). It must yield a `text` column;
/// every other column is carried through to the output untouched.
///
/// Use [`open`](Self::open) for an in-memory database and
/// [`open_persistent`](Self::open_persistent) to query tables stored in a
/// DuckDB file.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Read a SQL file and run it, returning all rows as Arrow batches.
    pub fn extract_from_file(&self, sql_path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
        if !sql_path.exists() {
            return Err(StoreError::SqlNotFound(sql_path.to_path_buf()));
        }
        let sql = std::fs::read_to_string(sql_path)?;
        debug!(path = %sql_path.display(), "running extraction query");

        let batches = self.query_arrow(&sql)?;
        let count: usize = batches.iter().map(|b| b.num_rows()).sum();
        info!(count, "loaded rows from DuckDB");
        Ok(batches)
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    ///
    /// A query that matches no rows still yields one empty batch carrying the
    /// result schema, so callers always see the column names.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let arrow = stmt.query_arrow([])?;
        let schema = arrow.get_schema();
        let mut batches: Vec<RecordBatch> = arrow.collect();
        if batches.is_empty() {
            batches.push(RecordBatch::new_empty(schema));
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;

    const BACKLOG_SQL: &str = "SELECT * FROM (VALUES \
        (1, 'Fix crash on login', 'Sprint 1'), \
        (2, 'Added CLI flag for export', 'Sprint 1'), \
        (3, 'Refactor storage layer', 'Sprint 2')) \
        AS t(issue_id, text, sprint) ORDER BY issue_id";

    #[test]
    fn open_in_memory() {
        let store = DuckStore::open().unwrap();
        let batches = store.query_arrow("SELECT 1 AS x").unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 1);
    }

    #[test]
    fn extract_missing_file_errors() {
        let store = DuckStore::open().unwrap();
        let result = store.extract_from_file(Path::new("/nonexistent/extract.sql"));
        assert!(matches!(result, Err(StoreError::SqlNotFound(_))));
    }

    #[test]
    fn extract_from_sql_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sql_path = tmp.path().join("extract.sql");
        std::fs::write(&sql_path, BACKLOG_SQL).unwrap();

        let store = DuckStore::open().unwrap();
        let batches = store.extract_from_file(&sql_path).unwrap();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 3);

        let schema = batches[0].schema();
        assert_eq!(schema.field(0).name(), "issue_id");
        assert_eq!(schema.field(1).name(), "text");
        assert_eq!(schema.field(2).name(), "sprint");

        let text = batches[0]
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(text.value(1), "Added CLI flag for export");
    }

    #[test]
    fn invalid_sql_errors() {
        let store = DuckStore::open().unwrap();
        let result = store.query_arrow("SELECT * FROM no_such_table");
        assert!(matches!(result, Err(StoreError::DuckDb(_))));
    }

    #[test]
    fn empty_result_keeps_schema() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sql_path = tmp.path().join("extract.sql");
        std::fs::write(
            &sql_path,
            BACKLOG_SQL.replace("ORDER BY issue_id", "WHERE 1 = 0"),
        )
        .unwrap();

        let store = DuckStore::open().unwrap();
        let batches = store.extract_from_file(&sql_path).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 0);

        let schema = batches[0].schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["issue_id", "text", "sprint"]);
    }

    #[test]
    fn persistent_table_survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("backlog.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(db_path.exists());
        store
            .query_arrow(&format!("CREATE TABLE backlog AS {BACKLOG_SQL}"))
            .unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        let batches = store
            .query_arrow("SELECT text FROM backlog ORDER BY issue_id")
            .unwrap();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 3);
    }
}

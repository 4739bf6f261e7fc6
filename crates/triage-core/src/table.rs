//! Table assembly: pull the text column out of the extracted rows, and
//! merge per-provider prediction columns back onto the passthrough fields.
//!
//! Rows are identified by position across the concatenated input batches,
//! so every prediction column must have exactly one value per input row in
//! input order.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, LargeStringArray, StringArray, StringViewArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use thiserror::Error;

use crate::{ProviderId, Taxonomy};

/// Prefix for every prediction column header.
pub const PREDICTION_PREFIX: &str = "predicted_";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("missing '{0}' column")]
    MissingColumn(String),

    #[error("column '{column}' has unsupported type {data_type}, expected a string column")]
    UnsupportedType { column: String, data_type: DataType },

    #[error("prediction column '{column}' has {actual} values for {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate output column '{0}'")]
    DuplicateColumn(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Predictions of one provider: one category id per input row, in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionColumn {
    pub provider: ProviderId,
    /// Output header, unique within the final table.
    pub name: String,
    pub values: Vec<String>,
}

impl PredictionColumn {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Count of rows per category, in taxonomy order (zero counts included).
    pub fn distribution<'t>(&self, taxonomy: &'t Taxonomy) -> Vec<(&'t str, usize)> {
        let mut counts: Vec<(&str, usize)> = taxonomy.ids().map(|id| (id, 0)).collect();
        for value in &self.values {
            if let Some(pos) = taxonomy.position(value) {
                counts[pos].1 += 1;
            }
        }
        counts
    }
}

/// Header for a provider's prediction column, before collision handling.
///
/// `predicted_` followed by the last `/` segment of the id, with anything
/// outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn prediction_column_name(provider: &ProviderId) -> String {
    let short = match provider.short_name() {
        "" => provider.as_str(),
        s => s,
    };
    let sanitized: String = short
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{PREDICTION_PREFIX}{sanitized}")
}

/// Allocates collision-free output column names.
///
/// Seed it with the passthrough column names; each allocation takes the
/// base name from [`prediction_column_name`] and appends `_2`, `_3`, ... on
/// collision, so allocation order decides who keeps the plain name.
#[derive(Debug, Default)]
pub struct ColumnNamer {
    taken: HashSet<String>,
}

impl ColumnNamer {
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: reserved.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allocate(&mut self, provider: &ProviderId) -> String {
        let base = prediction_column_name(provider);
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{base}_{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Passthrough column names of the input (text column excluded), in order.
pub fn passthrough_columns(batches: &[RecordBatch], text_column: &str) -> Vec<String> {
    batches
        .first()
        .map(|b| {
            b.schema()
                .fields()
                .iter()
                .filter(|f| f.name() != text_column)
                .map(|f| f.name().clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Read the text column across all batches, in row order.
///
/// Accepts `Utf8`, `LargeUtf8` and `Utf8View`. Null cells become empty
/// strings so every row still gets a prediction.
pub fn extract_texts(batches: &[RecordBatch], text_column: &str) -> Result<Vec<String>, TableError> {
    let total: usize = batches.iter().map(|b| b.num_rows()).sum();
    let mut texts = Vec::with_capacity(total);

    for batch in batches {
        let col = batch
            .column_by_name(text_column)
            .ok_or_else(|| TableError::MissingColumn(text_column.to_string()))?;
        push_strings(col.as_ref(), text_column, &mut texts)?;
    }

    Ok(texts)
}

fn push_strings(col: &dyn Array, name: &str, out: &mut Vec<String>) -> Result<(), TableError> {
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        out.extend(arr.iter().map(|v| v.unwrap_or_default().to_string()));
    } else if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        out.extend(arr.iter().map(|v| v.unwrap_or_default().to_string()));
    } else if let Some(arr) = any.downcast_ref::<StringViewArray>() {
        out.extend(arr.iter().map(|v| v.unwrap_or_default().to_string()));
    } else {
        return Err(TableError::UnsupportedType {
            column: name.to_string(),
            data_type: col.data_type().clone(),
        });
    }
    Ok(())
}

/// Build the output table: input rows minus `text_column`, followed by one
/// `Utf8` column per prediction, in the order given.
pub fn assemble(
    batches: &[RecordBatch],
    text_column: &str,
    predictions: &[PredictionColumn],
) -> Result<RecordBatch, TableError> {
    let (mut fields, mut columns, num_rows) = match batches.first() {
        Some(first) => {
            let schema = first.schema();
            let merged = arrow::compute::concat_batches(&schema, batches)?;
            let text_idx = schema
                .index_of(text_column)
                .map_err(|_| TableError::MissingColumn(text_column.to_string()))?;

            let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + predictions.len());
            let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());
            for (i, field) in schema.fields().iter().enumerate() {
                if i == text_idx {
                    continue;
                }
                fields.push(field.as_ref().clone());
                columns.push(merged.column(i).clone());
            }
            (fields, columns, merged.num_rows())
        }
        None => (Vec::new(), Vec::new(), 0),
    };

    for prediction in predictions {
        if prediction.values.len() != num_rows {
            return Err(TableError::LengthMismatch {
                column: prediction.name.clone(),
                expected: num_rows,
                actual: prediction.values.len(),
            });
        }
        if fields.iter().any(|f| f.name() == &prediction.name) {
            return Err(TableError::DuplicateColumn(prediction.name.clone()));
        }
        fields.push(Field::new(&prediction.name, DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from_iter_values(
            prediction.values.iter(),
        )));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

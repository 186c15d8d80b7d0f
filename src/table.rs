//! Eagerly materialized query results.
//!
//! A [`ResultTable`] holds every row of a finished query as an arrow
//! [`RecordBatch`] and no longer needs the connection that produced it.

use crate::error::Result;
use crate::sqlite::Value;
use arrow::array::{Array, ArrayRef, BinaryArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::pretty::pretty_format_batches;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Rows × named columns, stored column-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    batch: RecordBatch,
}

impl ResultTable {
    /// Build a table from column names and row values.
    ///
    /// SQLite columns carry no fixed type, so each column's arrow type is
    /// picked from the values it holds: any text makes it `Utf8`, otherwise
    /// blobs make it `Binary`, reals `Float64`, and everything else `Int64`.
    /// Fails when a row's width differs from the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ArrowError::InvalidArgumentError(format!(
                "row {index} has {} values, expected {}",
                row.len(),
                columns.len()
            ))
            .into());
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            let values: Vec<&Value> = rows.iter().map(|row| &row[i]).collect();
            let array = column_array(&values);
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        let batch = RecordBatch::try_new_with_options(schema, arrays, &options)?;
        Ok(Self { columns, batch })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// The underlying batch, for handing to arrow-based tooling.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        if index >= self.row_count() {
            return None;
        }
        Some(
            self.batch
                .columns()
                .iter()
                .map(|array| value_at(array, index))
                .collect(),
        )
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.row_count()).filter_map(move |i| self.row(i))
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        let array = self.batch.column(index);
        Some((0..array.len()).map(|i| value_at(array, i)).collect())
    }

    /// The first `n` rows as a new table.
    pub fn head(&self, n: usize) -> ResultTable {
        Self {
            columns: self.columns.clone(),
            batch: self.batch.slice(0, n.min(self.row_count())),
        }
    }
}

fn column_array(values: &[&Value]) -> ArrayRef {
    let any = |pred: fn(&Value) -> bool| values.iter().any(|v| pred(v));
    let has_text = any(|v| matches!(v, Value::Text(_)));
    let has_blob = any(|v| matches!(v, Value::Blob(_)));
    let has_real = any(|v| matches!(v, Value::Real(_)));
    let has_number = any(|v| matches!(v, Value::Integer(_) | Value::Real(_) | Value::Boolean(_)));

    if has_text || (has_blob && has_number) {
        let strings: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        Arc::new(StringArray::from(strings))
    } else if has_blob {
        let blobs: Vec<Option<&[u8]>> = values
            .iter()
            .map(|v| match v {
                Value::Blob(b) => Some(b.as_slice()),
                _ => None,
            })
            .collect();
        Arc::new(BinaryArray::from(blobs))
    } else if has_real {
        Arc::new(Float64Array::from(
            values.iter().map(|v| v.as_f64()).collect::<Vec<_>>(),
        ))
    } else {
        Arc::new(Int64Array::from(
            values.iter().map(|v| v.as_i64()).collect::<Vec<_>>(),
        ))
    }
}

fn value_at(array: &ArrayRef, index: usize) -> Value {
    if array.is_null(index) {
        return Value::Null;
    }
    let any = array.as_any();
    match array.data_type() {
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Value::Null, |a| Value::Integer(a.value(index))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Value::Null, |a| Value::Real(a.value(index))),
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Value::Null, |a| Value::Text(a.value(index).to_string())),
        DataType::Binary => any
            .downcast_ref::<BinaryArray>()
            .map_or(Value::Null, |a| Value::Blob(a.value(index).to_vec())),
        _ => Value::Null,
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pretty = pretty_format_batches(&[self.batch.clone()]).map_err(|_| fmt::Error)?;
        write!(f, "{pretty}")
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Value>> = self.rows().collect();
        let mut table = serializer.serialize_struct("ResultTable", 2)?;
        table.serialize_field("columns", &self.columns)?;
        table.serialize_field("rows", &rows)?;
        table.end()
    }
}

//! Bundle store capability and its Parquet implementation

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use datamarket_types::DataFrequency;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::{BundleData, BundleError, Result, Row};

pub const DATE_COLUMN: &str = "date";
pub const SYMBOL_COLUMN: &str = "symbol";
pub const FREQUENCY_KEY: &str = "frequency";

/// What is known about a bundle file without reading its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    pub frequency: DataFrequency,
    pub value_columns: Vec<String>,
}

/// Columnar file access used by the merge engine
pub trait BundleStore: Send + Sync {
    /// Read a bundle file's schema
    fn open(&self, path: &Path) -> Result<BundleHeader>;

    /// Read every row of a bundle file
    fn read_all(&self, path: &Path) -> Result<BundleData>;

    /// Write `data` to a new file at `path`, synced to disk on return
    fn write(&self, path: &Path, data: &BundleData) -> Result<()>;

    /// Atomically put `staged` in place of `target`
    fn replace(&self, staged: &Path, target: &Path) -> Result<()> {
        std::fs::rename(staged, target)?;
        Ok(())
    }
}

/// Bundles as single Parquet files: `date`, `symbol`, then Float64 values
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetBundleStore;

impl ParquetBundleStore {
    fn schema(data: &BundleData) -> SchemaRef {
        let mut fields = vec![
            Field::new(DATE_COLUMN, DataType::Int64, false),
            Field::new(SYMBOL_COLUMN, DataType::Utf8, false),
        ];
        fields.extend(
            data.value_columns
                .iter()
                .map(|name| Field::new(name, DataType::Float64, true)),
        );

        let metadata = HashMap::from([(
            FREQUENCY_KEY.to_string(),
            data.frequency.as_str().to_string(),
        )]);
        Arc::new(Schema::new_with_metadata(fields, metadata))
    }

    fn to_batch(data: &BundleData) -> Result<RecordBatch> {
        let dates: Vec<i64> = data.rows.iter().map(|r| r.date).collect();
        let symbols: Vec<&str> = data.rows.iter().map(|r| r.symbol.as_str()).collect();

        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(dates)),
            Arc::new(StringArray::from(symbols)),
        ];
        for index in 0..data.value_columns.len() {
            let values: Vec<Option<f64>> = data
                .rows
                .iter()
                .map(|r| r.values.get(index).copied().flatten())
                .collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        Ok(RecordBatch::try_new(Self::schema(data), columns)?)
    }

    fn header(path: &Path, schema: &Schema) -> Result<BundleHeader> {
        let invalid = |reason: String| BundleError::InvalidSchema {
            path: path.to_path_buf(),
            reason,
        };

        let fields = schema.fields();
        if fields.len() < 2
            || fields[0].name() != DATE_COLUMN
            || fields[0].data_type() != &DataType::Int64
            || fields[1].name() != SYMBOL_COLUMN
            || fields[1].data_type() != &DataType::Utf8
        {
            return Err(invalid(format!(
                "expected leading {DATE_COLUMN}: Int64 and {SYMBOL_COLUMN}: Utf8 columns"
            )));
        }

        let mut value_columns = Vec::with_capacity(fields.len() - 2);
        for field in fields.iter().skip(2) {
            if field.data_type() != &DataType::Float64 {
                return Err(invalid(format!(
                    "value column {} is {}, expected Float64",
                    field.name(),
                    field.data_type()
                )));
            }
            value_columns.push(field.name().clone());
        }

        let frequency = schema
            .metadata()
            .get(FREQUENCY_KEY)
            .ok_or_else(|| BundleError::MissingFrequency {
                path: path.to_path_buf(),
            })?
            .parse::<DataFrequency>()
            .map_err(|e| invalid(e.to_string()))?;

        Ok(BundleHeader {
            frequency,
            value_columns,
        })
    }

    fn column<'a, T: 'static>(path: &Path, batch: &'a RecordBatch, index: usize) -> Result<&'a T> {
        batch
            .column(index)
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| BundleError::InvalidSchema {
                path: path.to_path_buf(),
                reason: format!("column {index} has an unexpected array type"),
            })
    }
}

impl BundleStore for ParquetBundleStore {
    fn open(&self, path: &Path) -> Result<BundleHeader> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        Self::header(path, builder.schema())
    }

    fn read_all(&self, path: &Path) -> Result<BundleData> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let header = Self::header(path, builder.schema())?;
        let reader = builder.build()?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch?;
            let dates = Self::column::<Int64Array>(path, &batch, 0)?;
            let symbols = Self::column::<StringArray>(path, &batch, 1)?;
            let values = (0..header.value_columns.len())
                .map(|i| Self::column::<Float64Array>(path, &batch, i + 2))
                .collect::<Result<Vec<_>>>()?;

            for i in 0..batch.num_rows() {
                let cells = values
                    .iter()
                    .map(|col| (!col.is_null(i)).then(|| col.value(i)))
                    .collect();
                rows.push(Row::new(dates.value(i), symbols.value(i), cells));
            }
        }

        BundleData::new(header.frequency, header.value_columns, rows)
    }

    fn write(&self, path: &Path, data: &BundleData) -> Result<()> {
        let batch = Self::to_batch(data)?;
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        let file = writer.into_inner()?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BundleData {
        BundleData::new(
            DataFrequency::Hourly,
            vec!["open".into(), "close".into()],
            vec![
                Row::new(3600, "BTC", vec![Some(1.5), None]),
                Row::new(0, "ETH", vec![Some(2.0), Some(2.5)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_read_preserves_rows_and_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let store = ParquetBundleStore;

        store.write(&path, &sample()).unwrap();
        let header = store.open(&path).unwrap();
        assert_eq!(header.frequency, DataFrequency::Hourly);
        assert_eq!(header.value_columns, vec!["open", "close"]);

        let read = store.read_all(&path).unwrap();
        assert_eq!(read, sample());
    }

    #[test]
    fn test_missing_frequency_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new(DATE_COLUMN, DataType::Int64, false),
            Field::new(SYMBOL_COLUMN, DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1i64])),
                Arc::new(StringArray::from(vec!["A"])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            ParquetBundleStore.open(&path),
            Err(BundleError::MissingFrequency { .. })
        ));
    }

    #[test]
    fn test_non_float_value_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");

        let schema = Arc::new(Schema::new_with_metadata(
            vec![
                Field::new(DATE_COLUMN, DataType::Int64, false),
                Field::new(SYMBOL_COLUMN, DataType::Utf8, false),
                Field::new("label", DataType::Utf8, true),
            ],
            HashMap::from([(FREQUENCY_KEY.to_string(), "daily".to_string())]),
        ));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1i64])),
                Arc::new(StringArray::from(vec!["A"])),
                Arc::new(StringArray::from(vec!["x"])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            ParquetBundleStore.read_all(&path),
            Err(BundleError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_garbage_file_is_parquet_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        std::fs::write(&path, b"not parquet").unwrap();

        assert!(matches!(
            ParquetBundleStore.open(&path),
            Err(BundleError::Parquet(_))
        ));
    }
}

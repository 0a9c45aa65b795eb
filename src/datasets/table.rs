//! Arrow-backed tabular datasets loaded from Parquet or CSV.
//!
//! One column holds the label, an optional column holds the identity, and
//! every other numeric column is a feature (cast to `f32`).

use std::{
    io::{BufReader, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};

use arrow::{
    array::{Array, ArrayRef, Float32Array, Int64Array, RecordBatch, UInt64Array},
    compute::{cast, concat_batches},
    datatypes::DataType,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::{
    dataset::{Dataset, Sample},
    error::{Error, Result},
};

/// A table with a label column, an optional identity column and numeric
/// feature columns.
#[derive(Debug, Clone)]
pub struct TableDataset {
    features: Vec<Float32Array>,
    labels: Int64Array,
    identities: Option<UInt64Array>,
    feature_names: Vec<String>,
}

impl TableDataset {
    /// Builds a table from record batches sharing one schema.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no batches, a named column is missing
    /// or a column cannot be cast.
    pub fn from_batches(
        batches: &[RecordBatch],
        label_column: &str,
        identity_column: Option<&str>,
    ) -> Result<Self> {
        let first = batches
            .first()
            .ok_or_else(|| Error::dataset_resolution("table has no record batches"))?;
        let schema = first.schema();
        let batch = concat_batches(&schema, batches)?;

        let column_index = |name: &str| {
            schema.index_of(name).map_err(|_| {
                Error::dataset_resolution(format!("column '{name}' not found in table"))
            })
        };
        let label_idx = column_index(label_column)?;
        let identity_idx = identity_column.map(column_index).transpose()?;

        let labels = downcast::<Int64Array>(&cast(batch.column(label_idx), &DataType::Int64)?)?;
        let identities = identity_idx
            .map(|i| downcast::<UInt64Array>(&cast(batch.column(i), &DataType::UInt64)?))
            .transpose()?;

        let mut features = Vec::new();
        let mut feature_names = Vec::new();
        for (i, field) in schema.fields().iter().enumerate() {
            if i == label_idx || Some(i) == identity_idx || !field.data_type().is_numeric() {
                continue;
            }
            features.push(downcast::<Float32Array>(&cast(
                batch.column(i),
                &DataType::Float32,
            )?)?);
            feature_names.push(field.name().clone());
        }

        Ok(Self {
            features,
            labels,
            identities,
            feature_names,
        })
    }

    /// Loads a table from a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks the named columns.
    pub fn from_parquet(
        path: impl AsRef<Path>,
        label_column: &str,
        identity_column: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_batches(&batches, label_column, identity_column)
    }

    /// Loads a table from a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lacks the named columns.
    pub fn from_csv(
        path: impl AsRef<Path>,
        label_column: &str,
        identity_column: Option<&str>,
    ) -> Result<Self> {
        use arrow_csv::{reader::Format, ReaderBuilder};

        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
        let mut buf_reader = BufReader::new(file);

        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut buf_reader, Some(1000))?;
        buf_reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(e, path))?;

        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .build(buf_reader)?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_batches(&batches, label_column, identity_column)
    }

    /// Names of the feature columns, in order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

fn downcast<T: Array + Clone + 'static>(array: &ArrayRef) -> Result<T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::dataset_resolution("unexpected column type after cast"))
}

impl Dataset for TableDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        if index >= self.len() {
            return None;
        }
        let features = self
            .features
            .iter()
            .map(|col| {
                if col.is_null(index) {
                    f32::NAN
                } else {
                    col.value(index)
                }
            })
            .collect();
        Some(Sample {
            features,
            identity: self.identity(index),
            label: self.label(index),
        })
    }

    fn label(&self, index: usize) -> Option<i64> {
        (index < self.labels.len() && self.labels.is_valid(index)).then(|| self.labels.value(index))
    }

    fn identity(&self, index: usize) -> Option<u64> {
        let ids = self.identities.as_ref()?;
        (index < ids.len() && ids.is_valid(index)).then(|| ids.value(index))
    }

    fn has_identities(&self) -> bool {
        self.identities
            .as_ref()
            .is_some_and(|ids| ids.null_count() == 0)
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Float64Array, Int32Array, StringArray},
        datatypes::{Field, Schema},
    };
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Float64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("b", DataType::Int32, false),
            Field::new("writer", DataType::Int32, false),
            Field::new("label", DataType::Int32, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
                Arc::new(StringArray::from(vec!["x", "y", "z"])),
                Arc::new(Int32Array::from(vec![10, 20, 30])),
                Arc::new(Int32Array::from(vec![1, 1, 2])),
                Arc::new(Int32Array::from(vec![0, 1, 0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_batches_selects_numeric_features() {
        let table = TableDataset::from_batches(&[batch()], "label", Some("writer")).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.feature_names(), &["a".to_string(), "b".to_string()]);
        let s = table.get(1).unwrap();
        assert_eq!(s.features, vec![1.5, 20.0]);
        assert_eq!(s.label, Some(1));
        assert_eq!(s.identity, Some(1));
        assert!(table.has_identities());
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_without_identity() {
        let table = TableDataset::from_batches(&[batch()], "label", None).unwrap();
        assert!(!table.has_identities());
        assert_eq!(table.feature_names().len(), 3);
    }

    #[test]
    fn test_missing_label_column() {
        let result = TableDataset::from_batches(&[batch()], "target", None);
        assert!(matches!(result, Err(Error::DatasetResolution { .. })));
    }

    #[test]
    fn test_parquet_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.parquet");
        let b = batch();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, b.schema(), None).unwrap();
        writer.write(&b).unwrap();
        writer.close().unwrap();

        let table = TableDataset::from_parquet(&path, "label", None).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.label(2), Some(0));
    }

    #[test]
    fn test_csv_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "f1,f2,label\n0.1,1.0,3\n0.2,2.0,4\n").unwrap();
        let table = TableDataset::from_csv(&path, "label", None).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).unwrap().features, vec![0.2, 2.0]);
        assert_eq!(table.label(0), Some(3));
    }
}

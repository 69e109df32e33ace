//! Record batches and the batching stream

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::error::{Error, Result};
use crate::record::{Record, Value};
use crate::stream::{DataStream, StreamState};
use crate::transform::Grouped;

/// A collection of columns representing a batch of records in columnar format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    /// Columns in this batch, keyed by field name
    columns: BTreeMap<String, Column>,

    /// Number of records in this batch
    row_count: usize,
}

impl RecordBatch {
    /// Assemble a batch from records, in order
    ///
    /// Every record must carry the same field names as the first one. Each
    /// column ends up with exactly `records.len()` entries.
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let Some(first) = records.first() else {
            return Err(Error::InvalidArgument("Cannot build a batch from zero records".into()));
        };

        let names: Vec<&str> = first.field_names().collect();
        for (position, record) in records.iter().enumerate().skip(1) {
            if !record.field_names().eq(names.iter().copied()) {
                return Err(Error::SchemaMismatch(format!(
                    "record {position} has fields {:?}, expected {names:?}",
                    record.field_names().collect::<Vec<_>>()
                )));
            }
        }

        let mut columns = BTreeMap::new();
        for name in names {
            let values: Vec<&Value> = records
                .iter()
                .map(|record| record.get(name).ok_or(Error::IndexOutOfBounds))
                .collect::<Result<_>>()?;
            columns.insert(name.to_string(), Column::stack(name, &values)?);
        }

        Ok(Self {
            columns,
            row_count: records.len(),
        })
    }

    /// Get the number of records in this batch
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Get the number of columns in this batch
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get a reference to a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Iterate over the field names in sorted order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Consume the batch and return its columns
    pub fn into_columns(self) -> BTreeMap<String, Column> {
        self.columns
    }
}

/// A stream of record batches built from a stream of records
///
/// Every batch holds `size` records except possibly the last, which holds
/// between 1 and `size`. A record stream that ends immediately yields no
/// batches.
pub struct RecordBatches<S> {
    groups: Grouped<S>,
    state: StreamState,
}

impl<S: DataStream<Item = Record>> RecordBatches<S> {
    /// Batch `records` into groups of `size`
    pub fn new(records: S, size: usize) -> Result<Self> {
        Ok(Self {
            groups: Grouped::new(records, size)?,
            state: StreamState::Active,
        })
    }

    /// Get the configured batch size
    pub fn batch_size(&self) -> usize {
        self.groups.size()
    }

    async fn pull(&mut self) -> Result<Option<RecordBatch>> {
        match self.groups.next().await? {
            Some(records) => RecordBatch::from_records(&records).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<S: DataStream<Item = Record>> DataStream for RecordBatches<S> {
    type Item = RecordBatch;

    async fn next(&mut self) -> Result<Option<RecordBatch>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stream_from_items;
    use crate::stream::DataStreamExt;
    use crate::tensor::DenseTensor;
    use proptest::prelude::*;
    use serde_json::json;

    #[allow(clippy::cast_precision_loss)]
    fn numbered_record(i: usize) -> Record {
        let n = i as f32;
        Record::new()
            .with("number", n)
            .with("numberArray", DenseTensor::vector(vec![n, n * n, n * n * n]))
            .with("string", format!("Item {i}"))
    }

    #[tokio::test]
    async fn test_batches_of_eight_from_hundred_records() {
        let records = stream_from_items((0..100).map(numbered_record));
        let mut batches = records.batch(8).unwrap();
        let result = batches.collect_remaining().await.unwrap();

        assert_eq!(result.len(), 13);
        for batch in &result[..12] {
            assert_eq!(batch.row_count(), 8);
            assert_eq!(batch.column("number").unwrap().as_tensor().unwrap().shape(), &[8]);
            assert_eq!(batch.column("numberArray").unwrap().as_tensor().unwrap().shape(), &[8, 3]);
            assert_eq!(batch.column("string").unwrap().len(), 8);
        }

        let last = &result[12];
        assert_eq!(last.row_count(), 4);
        assert_eq!(
            last.column("number").unwrap().as_tensor().unwrap().data(),
            &[96.0, 97.0, 98.0, 99.0]
        );

        let powers = last.column("numberArray").unwrap().as_tensor().unwrap();
        assert_eq!(powers.shape(), &[4, 3]);
        assert_eq!(powers.row(0).unwrap().data(), &[96.0, 96.0 * 96.0, 96.0 * 96.0 * 96.0]);

        assert_eq!(
            last.column("string").unwrap().as_opaque().unwrap(),
            &[json!("Item 96"), json!("Item 97"), json!("Item 98"), json!("Item 99")]
        );
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_short_batch() {
        let records = stream_from_items((0..16).map(numbered_record));
        let result = records.batch(8).unwrap().collect_remaining().await.unwrap();
        assert_eq!(result.iter().map(RecordBatch::row_count).collect::<Vec<_>>(), vec![8, 8]);
    }

    #[tokio::test]
    async fn test_empty_record_stream_yields_no_batches() {
        let mut batches = stream_from_items(Vec::<Record>::new()).batch(4).unwrap();
        assert!(batches.next().await.unwrap().is_none());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let records = stream_from_items(Vec::<Record>::new());
        assert!(matches!(records.batch(0), Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_field_set_mismatch_fails_the_stream() {
        let records = vec![
            Record::new().with("a", 1.0),
            Record::new().with("b", 2.0),
        ];
        let mut batches = stream_from_items(records).batch(2).unwrap();
        assert!(matches!(batches.next().await, Err(Error::SchemaMismatch(_))));
        assert!(matches!(batches.next().await, Err(Error::StreamFailed)));
    }

    #[tokio::test]
    async fn test_mixed_field_values_are_a_type_mismatch() {
        let records = vec![Record::new().with("a", 1.0), Record::new().with("a", "one")];
        let mut batches = stream_from_items(records).batch(2).unwrap();
        assert!(matches!(batches.next().await, Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_from_records_rejects_empty_input() {
        assert!(RecordBatch::from_records(&[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_batch_counts_preserve_order(count in 0usize..120, size in 1usize..20) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let batches = runtime.block_on(async {
                let records = stream_from_items((0..count).map(numbered_record));
                records.batch(size).unwrap().collect_remaining().await.unwrap()
            });

            prop_assert_eq!(batches.len(), count.div_ceil(size));
            for (i, batch) in batches.iter().enumerate() {
                let expected = if i + 1 < batches.len() { size } else { count - i * size };
                prop_assert_eq!(batch.row_count(), expected);
                for column in batch.clone().into_columns().values() {
                    prop_assert_eq!(column.len(), expected);
                }
            }

            let numbers: Vec<f32> = batches
                .iter()
                .flat_map(|b| b.column("number").unwrap().as_tensor().unwrap().data().to_vec())
                .collect();
            #[allow(clippy::cast_precision_loss)]
            let expected: Vec<f32> = (0..count).map(|i| i as f32).collect();
            prop_assert_eq!(numbers, expected);
        }
    }
}

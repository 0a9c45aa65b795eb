//! Dataset types for fedtask.
//!
//! Provides the [`Dataset`] trait, the in-memory datasets a task record can
//! be materialized into, and [`IndexedDataset`], a read-only view over a
//! shared backing dataset.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single item of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Flattened feature vector.
    pub features: Vec<f32>,
    /// Identity / group of the sample (writer, speaker, ...), if tracked.
    pub identity: Option<u64>,
    /// Class label, absent for feature-only data.
    pub label: Option<i64>,
}

impl Sample {
    /// A labeled sample.
    #[must_use]
    pub fn labeled(features: Vec<f32>, label: i64) -> Self {
        Self {
            features,
            identity: None,
            label: Some(label),
        }
    }

    /// A sample with features only.
    #[must_use]
    pub fn unlabeled(features: Vec<f32>) -> Self {
        Self {
            features,
            identity: None,
            label: None,
        }
    }

    /// Attach an identity.
    #[must_use]
    pub fn with_identity(mut self, identity: u64) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// A dataset accessed by integer position `0..len`.
///
/// All implementations must be thread-safe (Send + Sync) so one backing
/// dataset can be shared by many views.
pub trait Dataset: Send + Sync + fmt::Debug {
    /// Returns the total number of items in the dataset.
    fn len(&self) -> usize;

    /// Returns true if the dataset contains no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the item at `index`, or `None` if out of bounds.
    fn get(&self, index: usize) -> Option<Sample>;

    /// Returns the label at `index` without materializing features.
    fn label(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(|s| s.label)
    }

    /// Returns the identity at `index`.
    fn identity(&self, index: usize) -> Option<u64> {
        self.get(index).and_then(|s| s.identity)
    }

    /// Whether every item carries an identity field.
    fn has_identities(&self) -> bool {
        false
    }
}

/// Shared ownership handle to a dataset.
pub type SharedDataset = Arc<dyn Dataset>;

/// In-memory dataset of feature/label pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XyDataset {
    x: Vec<Vec<f32>>,
    y: Vec<i64>,
}

impl XyDataset {
    /// Creates a dataset from parallel features and labels.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` and `y` differ in length.
    pub fn new(x: Vec<Vec<f32>>, y: Vec<i64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::LengthMismatch {
                what: "labels",
                left: x.len(),
                right: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    /// Feature rows.
    #[must_use]
    pub fn features(&self) -> &[Vec<f32>] {
        &self.x
    }

    /// Labels.
    #[must_use]
    pub fn labels(&self) -> &[i64] {
        &self.y
    }

    /// Sorted distinct labels.
    #[must_use]
    pub fn all_labels(&self) -> Vec<i64> {
        let mut labels = self.y.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

impl Dataset for XyDataset {
    fn len(&self) -> usize {
        self.y.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample::labeled(self.x.get(index)?.clone(), *self.y.get(index)?))
    }

    fn label(&self, index: usize) -> Option<i64> {
        self.y.get(index).copied()
    }
}

/// In-memory dataset of feature rows without labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XDataset {
    x: Vec<Vec<f32>>,
}

impl XDataset {
    /// Creates a dataset from feature rows.
    #[must_use]
    pub fn new(x: Vec<Vec<f32>>) -> Self {
        Self { x }
    }

    /// Feature rows.
    #[must_use]
    pub fn features(&self) -> &[Vec<f32>] {
        &self.x
    }
}

impl Dataset for XDataset {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        Some(Sample::unlabeled(self.x.get(index)?.clone()))
    }

    fn label(&self, _index: usize) -> Option<i64> {
        None
    }
}

/// In-memory dataset of (features, identity, label) triples.
///
/// The identity column lets the partitioner group samples by writer or
/// speaker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TupleDataset {
    x: Vec<Vec<f32>>,
    ids: Vec<u64>,
    y: Vec<i64>,
}

impl TupleDataset {
    /// Creates a dataset from parallel features, identities and labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the three arrays differ in length.
    pub fn new(x: Vec<Vec<f32>>, ids: Vec<u64>, y: Vec<i64>) -> Result<Self> {
        if ids.len() != x.len() {
            return Err(Error::LengthMismatch {
                what: "identities",
                left: x.len(),
                right: ids.len(),
            });
        }
        if y.len() != x.len() {
            return Err(Error::LengthMismatch {
                what: "labels",
                left: x.len(),
                right: y.len(),
            });
        }
        Ok(Self { x, ids, y })
    }

    /// Identities.
    #[must_use]
    pub fn identities(&self) -> &[u64] {
        &self.ids
    }
}

impl Dataset for TupleDataset {
    fn len(&self) -> usize {
        self.y.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        let sample = Sample::labeled(self.x.get(index)?.clone(), *self.y.get(index)?);
        Some(sample.with_identity(*self.ids.get(index)?))
    }

    fn label(&self, index: usize) -> Option<i64> {
        self.y.get(index).copied()
    }

    fn identity(&self, index: usize) -> Option<u64> {
        self.ids.get(index).copied()
    }

    fn has_identities(&self) -> bool {
        true
    }
}

/// Read-only view over a shared backing dataset through a private index list.
///
/// Item `i` of the view is item `indices[i]` of the backing dataset. The
/// backing data is never copied or mutated; any number of views may hold the
/// same backing handle.
#[derive(Clone)]
pub struct IndexedDataset {
    backing: SharedDataset,
    indices: Vec<usize>,
}

impl IndexedDataset {
    /// Creates a view over `backing`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] if any index is outside the
    /// backing dataset.
    pub fn new(backing: SharedDataset, indices: Vec<usize>) -> Result<Self> {
        let len = backing.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok(Self { backing, indices })
    }

    /// The backing dataset.
    #[must_use]
    pub fn backing(&self) -> &SharedDataset {
        &self.backing
    }

    /// Positions in the backing dataset.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl fmt::Debug for IndexedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedDataset")
            .field("backing_len", &self.backing.len())
            .field("len", &self.indices.len())
            .finish()
    }
}

impl Dataset for IndexedDataset {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        self.backing.get(*self.indices.get(index)?)
    }

    fn label(&self, index: usize) -> Option<i64> {
        self.backing.label(*self.indices.get(index)?)
    }

    fn identity(&self, index: usize) -> Option<u64> {
        self.backing.identity(*self.indices.get(index)?)
    }

    fn has_identities(&self) -> bool {
        self.backing.has_identities()
    }
}

/// Collects the labels of every item, failing on the first unlabeled one.
pub(crate) fn collect_labels(dataset: &dyn Dataset) -> Result<Vec<i64>> {
    (0..dataset.len())
        .map(|i| {
            dataset.label(i).ok_or_else(|| {
                Error::unsupported_dataset(format!("item {i} has no label"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(n: usize) -> XyDataset {
        let x = (0..n).map(|i| vec![i as f32, (i * 2) as f32]).collect();
        let y = (0..n).map(|i| (i % 3) as i64).collect();
        XyDataset::new(x, y).unwrap()
    }

    #[test]
    fn test_xy_length_mismatch() {
        let result = XyDataset::new(vec![vec![1.0], vec![2.0]], vec![0]);
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
    }

    #[test]
    fn test_xy_get() {
        let ds = xy(5);
        assert_eq!(ds.len(), 5);
        let s = ds.get(4).unwrap();
        assert_eq!(s.features, vec![4.0, 8.0]);
        assert_eq!(s.label, Some(1));
        assert!(ds.get(5).is_none());
        assert_eq!(ds.all_labels(), vec![0, 1, 2]);
    }

    #[test]
    fn test_x_dataset_has_no_labels() {
        let ds = XDataset::new(vec![vec![0.5]; 3]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.label(0), None);
        assert!(collect_labels(&ds).is_err());
    }

    #[test]
    fn test_tuple_dataset_identities() {
        let ds = TupleDataset::new(vec![vec![0.0]; 3], vec![7, 8, 7], vec![1, 0, 1]).unwrap();
        assert!(ds.has_identities());
        assert_eq!(ds.identity(2), Some(7));
        assert_eq!(ds.get(1).unwrap().identity, Some(8));
    }

    #[test]
    fn test_tuple_dataset_mismatch() {
        let result = TupleDataset::new(vec![vec![0.0]; 3], vec![1], vec![1, 2, 3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_indexed_view_reads_through() {
        let backing: SharedDataset = Arc::new(xy(10));
        let view = IndexedDataset::new(Arc::clone(&backing), vec![9, 3, 3, 0]).unwrap();
        assert_eq!(view.len(), 4);
        for (i, &idx) in view.indices().iter().enumerate() {
            assert_eq!(view.get(i), backing.get(idx));
        }
        assert!(view.get(4).is_none());
    }

    #[test]
    fn test_indexed_view_shares_backing() {
        let backing: SharedDataset = Arc::new(xy(4));
        let a = IndexedDataset::new(Arc::clone(&backing), vec![0, 1]).unwrap();
        let b = IndexedDataset::new(Arc::clone(&backing), vec![2, 3]).unwrap();
        assert!(Arc::ptr_eq(a.backing(), b.backing()));
        assert_eq!(Arc::strong_count(&backing), 3);
    }

    #[test]
    fn test_indexed_view_rejects_out_of_range() {
        let backing: SharedDataset = Arc::new(xy(3));
        let result = IndexedDataset::new(backing, vec![0, 3]);
        assert!(matches!(
            result,
            Err(Error::IndexOutOfBounds { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_collect_labels() {
        assert_eq!(collect_labels(&xy(4)).unwrap(), vec![0, 1, 2, 0]);
    }
}

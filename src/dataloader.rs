//! Batched iteration over client datasets.
//!
//! The [`DataLoader`] yields `Vec<Sample>` batches from any
//! [`SharedDataset`], optionally in a seeded shuffled order.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::dataset::{Sample, SharedDataset};

/// A batch of samples.
pub type Batch = Vec<Sample>;

/// A data loader that provides batched iteration over a dataset.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use fedtask::{DataLoader, SharedDataset, XyDataset};
///
/// let x = (0..10).map(|i| vec![i as f32]).collect();
/// let y = vec![0; 10];
/// let dataset: SharedDataset = Arc::new(XyDataset::new(x, y).unwrap());
///
/// let loader = DataLoader::new(dataset).batch_size(4).shuffle(true).seed(7);
/// assert_eq!(loader.num_batches(), 3);
/// let sizes: Vec<usize> = loader.into_iter().map(|b| b.len()).collect();
/// assert_eq!(sizes, vec![4, 4, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: SharedDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<u64>,
}

impl DataLoader {
    /// Creates a new DataLoader over `dataset`.
    ///
    /// Defaults: batch size 1, no shuffling, keep the last partial batch,
    /// entropy-seeded shuffling.
    pub fn new(dataset: SharedDataset) -> Self {
        Self {
            dataset,
            batch_size: 1,
            shuffle: false,
            drop_last: false,
            seed: None,
        }
    }

    /// Sets the batch size (at least 1).
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Enables or disables shuffling.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Sets whether to drop the last incomplete batch.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Sets the shuffling seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the configured batch size.
    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the number of batches that will be yielded.
    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        if self.drop_last {
            len / self.batch_size
        } else {
            len.div_ceil(self.batch_size)
        }
    }

    /// Returns the number of samples in the underlying dataset.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Returns true if the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

impl IntoIterator for DataLoader {
    type Item = Batch;
    type IntoIter = DataLoaderIterator;

    fn into_iter(self) -> Self::IntoIter {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        DataLoaderIterator {
            dataset: self.dataset,
            batch_size: self.batch_size,
            drop_last: self.drop_last,
            indices,
            position: 0,
        }
    }
}

/// Iterator over batches of a [`DataLoader`].
#[derive(Debug)]
pub struct DataLoaderIterator {
    dataset: SharedDataset,
    batch_size: usize,
    drop_last: bool,
    indices: Vec<usize>,
    position: usize,
}

impl Iterator for DataLoaderIterator {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.indices.len().saturating_sub(self.position);
        if remaining == 0 {
            return None;
        }
        let batch_size = remaining.min(self.batch_size);
        if self.drop_last && batch_size < self.batch_size {
            return None;
        }

        let batch_indices = &self.indices[self.position..self.position + batch_size];
        self.position += batch_size;
        Some(
            batch_indices
                .iter()
                .filter_map(|&idx| self.dataset.get(idx))
                .collect(),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.indices.len().saturating_sub(self.position);
        let batches = if self.drop_last {
            remaining / self.batch_size
        } else {
            remaining.div_ceil(self.batch_size)
        };
        (batches, Some(batches))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::dataset::XyDataset;

    fn dataset(rows: usize) -> SharedDataset {
        let x = (0..rows).map(|i| vec![i as f32]).collect();
        let y = (0..rows).map(|i| i as i64).collect();
        Arc::new(XyDataset::new(x, y).unwrap())
    }

    fn labels(batches: &[Batch]) -> Vec<i64> {
        batches
            .iter()
            .flatten()
            .filter_map(|s| s.label)
            .collect()
    }

    #[test]
    fn test_basic_iteration() {
        let batches: Vec<Batch> = DataLoader::new(dataset(10)).batch_size(3).into_iter().collect();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[3].len(), 1);
        assert_eq!(labels(&batches), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_last() {
        let loader = DataLoader::new(dataset(10)).batch_size(3).drop_last(true);
        assert_eq!(loader.num_batches(), 3);
        let batches: Vec<Batch> = loader.into_iter().collect();
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn test_shuffle_deterministic() {
        let run = |seed| -> Vec<i64> {
            let loader = DataLoader::new(dataset(50))
                .batch_size(8)
                .shuffle(true)
                .seed(seed);
            labels(&loader.into_iter().collect::<Vec<_>>())
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_all_rows_covered() {
        let loader = DataLoader::new(dataset(25)).batch_size(7).shuffle(true);
        let seen: HashSet<i64> = labels(&loader.into_iter().collect::<Vec<_>>())
            .into_iter()
            .collect();
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_size_hint_and_zero_batch_size() {
        let loader = DataLoader::new(dataset(5)).batch_size(0);
        assert_eq!(loader.get_batch_size(), 1);
        let mut it = loader.into_iter();
        assert_eq!(it.size_hint(), (5, Some(5)));
        it.next();
        assert_eq!(it.size_hint(), (4, Some(4)));
    }

    #[test]
    fn test_empty_dataset() {
        let loader = DataLoader::new(dataset(0)).batch_size(4);
        assert!(loader.is_empty());
        assert_eq!(loader.into_iter().count(), 0);
    }
}

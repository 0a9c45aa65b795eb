//! Per-client train/validation holdout.
//!
//! Each client's index list is optionally shuffled and cut at
//! `floor(len * rate)`: the head trains, the tail validates.

// Cut index is floor(len * rate)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use rand::{seq::SliceRandom, Rng};

use crate::{
    error::{Error, Result},
    partition::PartitionResult,
};

/// Default fraction of each client's items used for training.
pub const DEFAULT_HOLDOUT_RATE: f64 = 0.8;

/// Train and validation indices per client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HoldoutResult {
    /// Training indices, one list per client.
    pub train: Vec<Vec<usize>>,
    /// Validation indices, one list per client.
    pub valid: Vec<Vec<usize>>,
}

impl HoldoutResult {
    /// Number of clients.
    #[must_use]
    pub fn num_clients(&self) -> usize {
        self.train.len()
    }

    /// Iterates `(train, valid)` per client.
    pub fn iter(&self) -> impl Iterator<Item = (&[usize], &[usize])> {
        self.train
            .iter()
            .zip(&self.valid)
            .map(|(t, v)| (t.as_slice(), v.as_slice()))
    }
}

/// Splits every client of `partition` into train/validation at `rate`.
///
/// # Errors
///
/// Returns a configuration error if `rate` is outside `[0, 1]`.
pub fn split<R: Rng + ?Sized>(
    partition: &PartitionResult,
    rate: f64,
    shuffle: bool,
    rng: &mut R,
) -> Result<HoldoutResult> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(Error::configuration(format!(
            "holdout rate must be within [0, 1], got {rate}"
        )));
    }

    let mut result = HoldoutResult {
        train: Vec::with_capacity(partition.num_clients()),
        valid: Vec::with_capacity(partition.num_clients()),
    };
    for client in &partition.clients {
        let mut idxs = client.clone();
        if shuffle {
            idxs.shuffle(rng);
        }
        let k = (idxs.len() as f64 * rate) as usize;
        let valid = idxs.split_off(k);
        result.train.push(idxs);
        result.valid.push(valid);
    }
    Ok(result)
}

//! Skewed partitioning of a dataset among simulated clients.
//!
//! A [`SkewSpec`] selects one of the [`Distribution`] models; the
//! [`Partitioner`] turns a labeled dataset into one index list per client.
//!
//! | id | distribution | clients receive |
//! |----|--------------|-----------------|
//! | 0 | IID | near-equal chunks of a random permutation |
//! | 1 | label quantity | a fixed number of labels each |
//! | 2 | label Dirichlet | per-label shares drawn from a refined Dirichlet |
//! | 3 | label shard | label-sorted shards dealt at random |
//! | 4 | feature noise | IID chunks; noise is applied downstream |
//! | 5 | feature identity | one client per identity value |
//! | 6 | IID volume | random volumes above a minimum |
//! | 7 | non-IID volume | reserved for synthetic generators |
//!
//! # Example
//!
//! ```
//! use fedtask::{partition::{partition, Distribution, SkewSpec}, XyDataset};
//!
//! let x = (0..100).map(|i| vec![i as f32]).collect();
//! let y = (0..100).map(|i| i % 10).collect();
//! let dataset = XyDataset::new(x, y).unwrap();
//!
//! let spec = SkewSpec::new(Distribution::LabelShard, 5).with_skewness(0.5);
//! let result = partition(&dataset, &spec).unwrap();
//! assert_eq!(result.num_clients(), 5);
//! assert!(result.is_disjoint_cover(100));
//! ```

#![allow(clippy::cast_precision_loss)]

pub mod dirichlet;
mod label_skew;
pub mod split;

use std::{collections::BTreeMap, fmt};

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use self::dirichlet::Convergence;
use crate::{
    dataset::{collect_labels, Dataset},
    error::{Error, Result},
    seed::SeedController,
};

/// Upper bound on rejected volume draws for [`Distribution::IidVolume`].
pub const MAX_VOLUME_ATTEMPTS: usize = 10_000;

/// Skew models, identified on disk and in task names by their numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Distribution {
    /// Identical and independent distribution.
    Iid,
    /// Each client owns a fixed number of labels.
    LabelQuantity,
    /// Per-label client shares follow a Dirichlet distribution.
    LabelDirichlet,
    /// Label-sorted shards dealt to clients.
    LabelShard,
    /// Feature noise; partitions like IID at this layer.
    FeatureNoise,
    /// One client per identity value of the data.
    FeatureIdentity,
    /// IID content with Dirichlet-distributed volumes.
    IidVolume,
    /// Non-IID volumes, only produced by synthetic generators.
    NiidVolume,
}

impl Distribution {
    /// All distributions in id order.
    pub const ALL: [Self; 8] = [
        Self::Iid,
        Self::LabelQuantity,
        Self::LabelDirichlet,
        Self::LabelShard,
        Self::FeatureNoise,
        Self::FeatureIdentity,
        Self::IidVolume,
        Self::NiidVolume,
    ];

    /// Looks up a distribution by id.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for ids above 7.
    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(id))
            .copied()
            .ok_or_else(|| Error::configuration(format!("unknown distribution id {id}")))
    }

    /// Numeric id.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Short name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Iid => "iid",
            Self::LabelQuantity => "label_skew_quantity",
            Self::LabelDirichlet => "label_skew_dirichlet",
            Self::LabelShard => "label_skew_shard",
            Self::FeatureNoise => "feature_skew_noise",
            Self::FeatureIdentity => "feature_skew_id",
            Self::IidVolume => "iid_volumn_skew",
            Self::NiidVolume => "niid_volumn_skew",
        }
    }

    /// Whether skewness is meaningful only within `[0, 1]`.
    const fn clamps_skewness(self) -> bool {
        matches!(
            self,
            Self::LabelQuantity | Self::LabelDirichlet | Self::LabelShard
        )
    }
}

impl TryFrom<u8> for Distribution {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::from_id(id)
    }
}

impl From<Distribution> for u8 {
    fn from(d: Distribution) -> Self {
        d.id()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to partition and how skewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewSpec {
    /// Skew model.
    pub distribution: Distribution,
    /// Degree of skew; `[0, 1]` for label models, Dirichlet concentration
    /// for volume skew.
    pub skewness: f64,
    /// Number of clients (overridden by identity skew).
    pub num_clients: usize,
    /// Minimum items per client under volume skew.
    pub min_volume: usize,
    /// Base seed of the run.
    pub seed: u64,
}

impl SkewSpec {
    /// A spec with no skew, `min_volume` 10 and seed 0.
    #[must_use]
    pub fn new(distribution: Distribution, num_clients: usize) -> Self {
        Self {
            distribution,
            skewness: 0.0,
            num_clients,
            min_volume: 10,
            seed: 0,
        }
    }

    /// Sets the skewness.
    #[must_use]
    pub fn with_skewness(mut self, skewness: f64) -> Self {
        self.skewness = skewness;
        self
    }

    /// Sets the minimum client volume.
    #[must_use]
    pub fn with_min_volume(mut self, min_volume: usize) -> Self {
        self.min_volume = min_volume;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Skewness as the selected algorithm uses it.
    #[must_use]
    pub fn effective_skewness(&self) -> f64 {
        match self.distribution {
            Distribution::Iid => 0.0,
            d if d.clamps_skewness() => self.skewness.clamp(0.0, 1.0),
            _ => self.skewness,
        }
    }

    /// Checks the spec independently of any dataset.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for zero clients, a non-finite
    /// skewness, a non-positive volume-skew concentration or the reserved
    /// non-IID volume model.
    pub fn validate(&self) -> Result<()> {
        if self.num_clients == 0 {
            return Err(Error::configuration("num_clients must be positive"));
        }
        if !self.skewness.is_finite() {
            return Err(Error::configuration(format!(
                "skewness must be finite, got {}",
                self.skewness
            )));
        }
        match self.distribution {
            Distribution::IidVolume if self.skewness <= 0.0 => Err(Error::configuration(
                "volume skew needs a positive skewness (Dirichlet concentration)",
            )),
            Distribution::NiidVolume => Err(Error::configuration(
                "distribution 7 (niid_volumn_skew) is only available to synthetic generators",
            )),
            _ => Ok(()),
        }
    }
}

/// Per-client index lists produced by a [`Partitioner`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionResult {
    /// Item indices owned by each client.
    pub clients: Vec<Vec<usize>>,
    /// Client proportion matrix for label Dirichlet skew (clients x labels),
    /// or one volume share per client for volume skew.
    pub proportions: Option<Vec<Vec<f64>>>,
    /// Refinement outcome for label Dirichlet skew.
    pub convergence: Option<Convergence>,
}

impl PartitionResult {
    /// Wraps plain index lists.
    #[must_use]
    pub fn new(clients: Vec<Vec<usize>>) -> Self {
        Self {
            clients,
            proportions: None,
            convergence: None,
        }
    }

    /// Number of clients.
    #[must_use]
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Items per client.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.clients.iter().map(Vec::len).collect()
    }

    /// Whether the lists are pairwise disjoint and together cover `0..len`.
    #[must_use]
    pub fn is_disjoint_cover(&self, len: usize) -> bool {
        let mut seen = vec![false; len];
        for &i in self.clients.iter().flatten() {
            match seen.get_mut(i) {
                Some(s) if !*s => *s = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|s| s)
    }
}

/// Item indices grouped by label, labels in ascending order.
struct ClassIndex {
    labels: Vec<i64>,
    by_class: Vec<Vec<usize>>,
}

impl ClassIndex {
    fn build(dataset: &dyn Dataset) -> Result<Self> {
        let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, label) in collect_labels(dataset)?.into_iter().enumerate() {
            groups.entry(label).or_default().push(i);
        }
        let (labels, by_class) = groups.into_iter().unzip();
        Ok(Self { labels, by_class })
    }
}

/// Partitions datasets according to a validated [`SkewSpec`].
#[derive(Debug, Clone)]
pub struct Partitioner {
    spec: SkewSpec,
}

impl Partitioner {
    /// Creates a partitioner.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid.
    pub fn new(spec: SkewSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    /// The spec in use.
    #[must_use]
    pub fn spec(&self) -> &SkewSpec {
        &self.spec
    }

    /// Splits `dataset` among clients, drawing randomness from `seeds`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty dataset or an unsatisfiable
    /// volume constraint, and an unsupported-dataset error when the model
    /// needs labels or identities the dataset lacks.
    pub fn partition(
        &self,
        dataset: &dyn Dataset,
        seeds: &mut SeedController,
    ) -> Result<PartitionResult> {
        let len = dataset.len();
        if len == 0 {
            return Err(Error::configuration("cannot partition an empty dataset"));
        }
        let n = self.spec.num_clients;
        let skewness = self.spec.effective_skewness();
        info!(
            distribution = %self.spec.distribution,
            clients = n,
            skewness,
            items = len,
            "partitioning dataset"
        );

        let result = match self.spec.distribution {
            Distribution::Iid | Distribution::FeatureNoise => {
                PartitionResult::new(iid(len, n, seeds.sampling()))
            }
            Distribution::LabelQuantity => {
                let classes = ClassIndex::build(dataset)?;
                debug!(labels = classes.labels.len(), "label quantity skew");
                let (sampling, selection) = seeds.streams();
                PartitionResult::new(label_skew::quantity(
                    &classes.by_class,
                    n,
                    skewness,
                    sampling,
                    selection,
                ))
            }
            Distribution::LabelDirichlet => {
                let classes = ClassIndex::build(dataset)?;
                let split =
                    label_skew::dirichlet(&classes.by_class, len, n, skewness, seeds.sampling())?;
                info!(
                    error = split.convergence.error,
                    passes = split.convergence.passes,
                    converged = split.convergence.converged,
                    "dirichlet proportions refined"
                );
                PartitionResult {
                    clients: split.clients,
                    proportions: Some(split.proportions),
                    convergence: Some(split.convergence),
                }
            }
            Distribution::LabelShard => {
                let classes = ClassIndex::build(dataset)?;
                PartitionResult::new(label_skew::shard(
                    &classes.by_class,
                    n,
                    skewness,
                    seeds.sampling(),
                ))
            }
            Distribution::FeatureIdentity => {
                let clients = by_identity(dataset)?;
                info!(clients = clients.len(), "client count taken from identities");
                PartitionResult::new(clients)
            }
            Distribution::IidVolume => {
                let (clients, shares) =
                    volume(len, n, skewness, self.spec.min_volume, seeds.sampling())?;
                PartitionResult {
                    clients,
                    proportions: Some(shares.into_iter().map(|p| vec![p]).collect()),
                    convergence: None,
                }
            }
            Distribution::NiidVolume => {
                return Err(Error::configuration(
                    "distribution 7 (niid_volumn_skew) is only available to synthetic generators",
                ))
            }
        };

        debug!(sizes = ?result.sizes(), "partition sizes");
        Ok(result)
    }
}

/// Partitions `dataset` with a fresh [`SeedController`] seeded from the spec.
///
/// # Errors
///
/// See [`Partitioner::partition`].
pub fn partition(dataset: &dyn Dataset, spec: &SkewSpec) -> Result<PartitionResult> {
    let mut seeds = SeedController::new(spec.seed);
    Partitioner::new(spec.clone())?.partition(dataset, &mut seeds)
}

fn permutation<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..len).collect();
    idxs.shuffle(rng);
    idxs
}

fn iid<R: Rng + ?Sized>(len: usize, num_clients: usize, rng: &mut R) -> Vec<Vec<usize>> {
    split::array_split(&permutation(len, rng), num_clients)
}

fn by_identity(dataset: &dyn Dataset) -> Result<Vec<Vec<usize>>> {
    if !dataset.has_identities() {
        return Err(Error::unsupported_dataset(
            "identity skew needs a dataset with an identity field",
        ));
    }
    let mut groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for i in 0..dataset.len() {
        let id = dataset
            .identity(i)
            .ok_or_else(|| Error::unsupported_dataset(format!("item {i} has no identity")))?;
        groups.entry(id).or_default().push(i);
    }
    Ok(groups.into_values().collect())
}

fn volume<R: Rng + ?Sized>(
    len: usize,
    num_clients: usize,
    skewness: f64,
    min_volume: usize,
    rng: &mut R,
) -> Result<(Vec<Vec<usize>>, Vec<f64>)> {
    if min_volume.saturating_mul(num_clients) > len {
        return Err(Error::configuration(format!(
            "min_volume {min_volume} x {num_clients} clients exceeds {len} items"
        )));
    }
    let idxs = permutation(len, rng);
    let alpha = vec![skewness; num_clients];

    for attempt in 0..MAX_VOLUME_ATTEMPTS {
        let Some(shares) = dirichlet::sample(&alpha, rng)? else {
            continue;
        };
        let smallest = shares.iter().copied().fold(f64::INFINITY, f64::min) * len as f64;
        if smallest < min_volume as f64 {
            continue;
        }
        let clients = split::split_at_proportions(&idxs, &shares);
        if clients.iter().all(|c| c.len() >= min_volume) {
            debug!(attempt, "volume draw accepted");
            return Ok((clients, shares));
        }
    }
    Err(Error::configuration(format!(
        "no volume draw met min_volume {min_volume} within {MAX_VOLUME_ATTEMPTS} attempts"
    )))
}

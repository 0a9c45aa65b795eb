//! Deterministic synthetic classification data.
//!
//! Samples are Gaussian blobs around per-class centers. Centers depend only
//! on `center_seed`, so a train and a test set generated with different
//! `seed`s share the same classes.

use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};

use super::DatasetArgs;
use crate::{
    dataset::{SharedDataset, TupleDataset, XyDataset},
    error::{Error, Result},
};

/// Parameters of a synthetic classification dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    /// Number of samples.
    pub num_samples: usize,
    /// Number of classes.
    pub num_classes: usize,
    /// Feature dimension.
    pub dim: usize,
    /// Number of distinct identities; `None` produces no identity field.
    pub num_identities: Option<usize>,
    /// Seed of the class centers.
    pub center_seed: u64,
    /// Seed of the samples.
    pub seed: u64,
    /// Standard deviation of samples around their center.
    pub noise: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            num_classes: 10,
            dim: 8,
            num_identities: None,
            center_seed: 0,
            seed: 0,
            noise: 0.5,
        }
    }
}

impl SyntheticConfig {
    /// Reads a config from constructor arguments. Only `num_samples` is
    /// mandatory.
    ///
    /// # Errors
    ///
    /// Returns a resolution error for missing or unparsable arguments.
    pub fn from_args(args: DatasetArgs<'_>) -> Result<Self> {
        let defaults = Self::default();
        let num_identities = match args.get("num_identities") {
            Some(_) => Some(args.parse("num_identities")?),
            None => None,
        };
        Ok(Self {
            num_samples: args.parse("num_samples")?,
            num_classes: args.parse_or("num_classes", defaults.num_classes)?,
            dim: args.parse_or("dim", defaults.dim)?,
            num_identities,
            center_seed: args.parse_or("center_seed", defaults.center_seed)?,
            seed: args.parse_or("seed", defaults.seed)?,
            noise: args.parse_or("noise", defaults.noise)?,
        })
    }

    /// Generates the dataset.
    ///
    /// # Errors
    ///
    /// Returns a resolution error for zero classes, dimensions or identities,
    /// or a negative noise level.
    pub fn generate(&self) -> Result<SharedDataset> {
        if self.num_classes == 0 || self.dim == 0 || self.num_identities == Some(0) {
            return Err(Error::dataset_resolution(
                "synthetic data needs at least one class, dimension and identity",
            ));
        }
        let noise = Normal::new(0.0, self.noise)
            .map_err(|e| Error::dataset_resolution(format!("noise {}: {e}", self.noise)))?;

        let mut centers_rng = StdRng::seed_from_u64(self.center_seed);
        let centers: Vec<Vec<f64>> = (0..self.num_classes)
            .map(|_| {
                (0..self.dim)
                    .map(|_| {
                        let z: f64 = StandardNormal.sample(&mut centers_rng);
                        3.0 * z
                    })
                    .collect()
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut x = Vec::with_capacity(self.num_samples);
        let mut y = Vec::with_capacity(self.num_samples);
        let mut ids = Vec::with_capacity(self.num_samples);
        for _ in 0..self.num_samples {
            let label = rng.gen_range(0..self.num_classes);
            #[allow(clippy::cast_possible_truncation)]
            let row: Vec<f32> = centers[label]
                .iter()
                .map(|c| (c + noise.sample(&mut rng)) as f32)
                .collect();
            x.push(row);
            y.push(i64::try_from(label).unwrap_or(i64::MAX));
            if let Some(n) = self.num_identities {
                ids.push(rng.gen_range(0..n as u64));
            }
        }

        Ok(match self.num_identities {
            Some(_) => Arc::new(TupleDataset::new(x, ids, y)?) as SharedDataset,
            None => Arc::new(XyDataset::new(x, y)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn test_generate_is_deterministic() {
        let config = SyntheticConfig {
            num_samples: 50,
            ..SyntheticConfig::default()
        };
        let a = config.generate().unwrap();
        let b = config.generate().unwrap();
        for i in 0..50 {
            assert_eq!(a.get(i), b.get(i));
        }
    }

    #[test]
    fn test_labels_within_range() {
        let config = SyntheticConfig {
            num_samples: 200,
            num_classes: 3,
            dim: 2,
            ..SyntheticConfig::default()
        };
        let ds = config.generate().unwrap();
        assert_eq!(ds.len(), 200);
        assert!((0..200).all(|i| matches!(ds.label(i), Some(0..=2))));
        assert_eq!(ds.get(0).unwrap().features.len(), 2);
        assert!(!ds.has_identities());
    }

    #[test]
    fn test_identities() {
        let config = SyntheticConfig {
            num_samples: 100,
            num_identities: Some(4),
            ..SyntheticConfig::default()
        };
        let ds = config.generate().unwrap();
        assert!(ds.has_identities());
        assert!((0..100).all(|i| ds.identity(i).is_some_and(|id| id < 4)));
    }

    #[test]
    fn test_from_args() {
        let mut map = BTreeMap::new();
        map.insert("num_samples".to_string(), "30".to_string());
        map.insert("num_identities".to_string(), "5".to_string());
        map.insert("seed".to_string(), "9".to_string());
        let config = SyntheticConfig::from_args(DatasetArgs::new(&map)).unwrap();
        assert_eq!(config.num_samples, 30);
        assert_eq!(config.num_identities, Some(5));
        assert_eq!(config.seed, 9);
        assert_eq!(config.num_classes, 10);
    }

    #[test]
    fn test_missing_num_samples() {
        let map = BTreeMap::new();
        assert!(SyntheticConfig::from_args(DatasetArgs::new(&map)).is_err());
    }

    #[test]
    fn test_zero_classes_rejected() {
        let config = SyntheticConfig {
            num_classes: 0,
            ..SyntheticConfig::default()
        };
        assert!(config.generate().is_err());
    }
}

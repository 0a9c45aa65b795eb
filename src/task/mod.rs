//! On-disk federated tasks.
//!
//! A task lives in a directory named by its [`TaskKey`]:
//!
//! ```text
//! fedtask/
//! └── mnist_cnum10_dist2_skew0.5_seed0/
//!     ├── data.json     TaskRecord
//!     └── record/       experiment logs written by training runs
//! ```
//!
//! [`TaskWriter`] creates the directory and the record, rolling everything
//! back if any step fails. [`TaskReader`] turns a record back into one train
//! and one validation dataset per client plus a shared test dataset.

mod reader;
mod record;
mod writer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::{
    reader::{read_record, TaskData, TaskReader},
    record::{ClientRecord, SplitData, TaskRecord},
    writer::{build_record, TaskContent, TaskWriter},
};
use crate::partition::{Distribution, SkewSpec};

/// File holding the [`TaskRecord`] inside a task directory.
pub const DATA_FILE: &str = "data.json";

/// Sub-directory reserved for experiment logs.
pub const RECORD_DIR: &str = "record";

/// How client and test data are stored in a [`TaskRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StoreMode {
    /// Features and labels inline.
    #[default]
    #[serde(rename = "XY")]
    Xy,
    /// Item indices into a backing dataset described by a `DataSource`.
    #[serde(rename = "IDX")]
    Idx,
    /// Features only, inline.
    #[serde(rename = "X")]
    X,
}

impl StoreMode {
    /// Tag written to the `store` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xy => "XY",
            Self::Idx => "IDX",
            Self::X => "X",
        }
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key naming a task directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskKey {
    /// Benchmark name, e.g. `mnist_classification`.
    pub benchmark: String,
    /// Configured number of clients.
    pub num_clients: usize,
    /// Skew model.
    pub distribution: Distribution,
    /// Configured skewness (always 0 for IID).
    pub skewness: f64,
    /// Base seed.
    pub seed: u64,
}

impl TaskKey {
    /// Key of a task generated from `spec` on `benchmark`.
    pub fn new(benchmark: impl Into<String>, spec: &SkewSpec) -> Self {
        let skewness = if spec.distribution == Distribution::Iid {
            0.0
        } else {
            spec.skewness
        };
        Self {
            benchmark: benchmark.into(),
            num_clients: spec.num_clients,
            distribution: spec.distribution,
            skewness,
            seed: spec.seed,
        }
    }

    /// Directory name, `{benchmark}_cnum{N}_dist{id}_skew{s}_seed{seed}`.
    ///
    /// IID tasks always write `skew0`. Other skews keep a fractional part,
    /// so `1` is written `skew1.0` and `0.5` stays `skew0.5`.
    #[must_use]
    pub fn name(&self) -> String {
        format!(
            "{}_cnum{}_dist{}_skew{}_seed{}",
            self.benchmark,
            self.num_clients,
            self.distribution.id(),
            self.skew_label(),
            self.seed
        )
    }

    fn skew_label(&self) -> String {
        if self.distribution == Distribution::Iid {
            "0".to_string()
        } else if self.skewness.is_finite() && self.skewness.fract() == 0.0 {
            format!("{:.1}", self.skewness)
        } else {
            self.skewness.to_string()
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Names of `count` clients: `Client` followed by the index, zero-padded to
/// the number of digits of `count`.
#[must_use]
pub fn client_names(count: usize) -> Vec<String> {
    let width = count.to_string().len();
    (0..count)
        .map(|i| format!("Client{i:0>width$}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_key_name() {
        let spec = SkewSpec::new(Distribution::LabelDirichlet, 10)
            .with_skewness(0.5)
            .with_seed(3);
        let key = TaskKey::new("mnist_classification", &spec);
        assert_eq!(
            key.name(),
            "mnist_classification_cnum10_dist2_skew0.5_seed3"
        );
    }

    #[test]
    fn test_iid_key_drops_skewness() {
        let spec = SkewSpec::new(Distribution::Iid, 4).with_skewness(0.7);
        let key = TaskKey::new("cifar10", &spec);
        assert_eq!(key.to_string(), "cifar10_cnum4_dist0_skew0_seed0");
    }

    #[test]
    fn test_whole_skewness_keeps_decimal() {
        let spec = SkewSpec::new(Distribution::LabelShard, 10).with_skewness(1.0);
        assert_eq!(
            TaskKey::new("mnist", &spec).name(),
            "mnist_cnum10_dist3_skew1.0_seed0"
        );
        let spec = SkewSpec::new(Distribution::FeatureIdentity, 10);
        assert_eq!(
            TaskKey::new("femnist", &spec).name(),
            "femnist_cnum10_dist5_skew0.0_seed0"
        );
    }

    #[test]
    fn test_client_names_padding() {
        assert_eq!(client_names(3), vec!["Client0", "Client1", "Client2"]);
        let names = client_names(12);
        assert_eq!(names[0], "Client00");
        assert_eq!(names[11], "Client11");
        assert_eq!(client_names(100)[7], "Client007");
        assert!(client_names(0).is_empty());
    }

    #[test]
    fn test_store_mode_tags() {
        assert_eq!(serde_json::to_string(&StoreMode::Idx).unwrap(), "\"IDX\"");
        let mode: StoreMode = serde_json::from_str("\"X\"").unwrap();
        assert_eq!(mode, StoreMode::X);
        assert_eq!(StoreMode::default().to_string(), "XY");
        assert!(serde_json::from_str::<StoreMode>("\"xy\"").is_err());
    }
}

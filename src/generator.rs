//! Task generation runs.
//!
//! ```text
//! TaskGenConfig ──► exists? ──yes──► AlreadyExists (no-op)
//!                      │no
//!                      ▼
//!   SourceData ──► Partitioner ──► holdout::split ──► TaskWriter::save
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    dataset::SharedDataset,
    datasets::{DataSource, DatasetRegistry},
    error::{Error, Result},
    holdout::{self, HoldoutResult, DEFAULT_HOLDOUT_RATE},
    partition::{Distribution, PartitionResult, Partitioner, SkewSpec},
    seed::SeedController,
    task::{client_names, StoreMode, TaskContent, TaskKey, TaskWriter},
};

/// Configuration of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskGenConfig {
    /// Benchmark name, the first component of the task name.
    pub benchmark: String,
    /// Skew model.
    pub distribution: Distribution,
    /// Degree of skew.
    pub skewness: f64,
    /// Number of clients.
    pub num_clients: usize,
    /// Minimum items per client under volume skew.
    pub min_volume: usize,
    /// Base seed.
    pub seed: u64,
    /// Fraction of each client's items used for training.
    pub holdout_rate: f64,
    /// Whether client items are shuffled before the holdout cut.
    pub shuffle_holdout: bool,
    /// Directory holding task directories.
    pub task_root: PathBuf,
    /// Storage mode of the written record.
    pub store: StoreMode,
}

impl Default for TaskGenConfig {
    fn default() -> Self {
        Self {
            benchmark: "synthetic".to_string(),
            distribution: Distribution::Iid,
            skewness: 0.0,
            num_clients: 1,
            min_volume: 10,
            seed: 0,
            holdout_rate: DEFAULT_HOLDOUT_RATE,
            shuffle_holdout: true,
            task_root: PathBuf::from("./fedtask"),
            store: StoreMode::Xy,
        }
    }
}

impl TaskGenConfig {
    /// Default config for `benchmark`.
    pub fn new(benchmark: impl Into<String>) -> Self {
        Self {
            benchmark: benchmark.into(),
            ..Self::default()
        }
    }

    /// Sets the skew model and skewness.
    #[must_use]
    pub fn with_distribution(mut self, distribution: Distribution, skewness: f64) -> Self {
        self.distribution = distribution;
        self.skewness = skewness;
        self
    }

    /// Sets the number of clients.
    #[must_use]
    pub fn with_num_clients(mut self, num_clients: usize) -> Self {
        self.num_clients = num_clients;
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

    /// Sets the holdout rate and shuffling.
    #[must_use]
    pub fn with_holdout(mut self, rate: f64, shuffle: bool) -> Self {
        self.holdout_rate = rate;
        self.shuffle_holdout = shuffle;
        self
    }

    /// Sets the task root directory.
    #[must_use]
    pub fn with_task_root(mut self, task_root: impl Into<PathBuf>) -> Self {
        self.task_root = task_root.into();
        self
    }

    /// Sets the storage mode.
    #[must_use]
    pub fn with_store(mut self, store: StoreMode) -> Self {
        self.store = store;
        self
    }

    /// Loads a config from a JSON file; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and a configuration
    /// error if it does not parse.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::io(e, path))?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::configuration(format!("{}: {e}", path.display())))
    }

    /// Skew spec of the run. IID runs carry no skewness.
    #[must_use]
    pub fn skew_spec(&self) -> SkewSpec {
        let skewness = if self.distribution == Distribution::Iid {
            0.0
        } else {
            self.skewness
        };
        SkewSpec::new(self.distribution, self.num_clients)
            .with_skewness(skewness)
            .with_min_volume(self.min_volume)
            .with_seed(self.seed)
    }

    /// Key naming the task directory.
    #[must_use]
    pub fn task_key(&self) -> TaskKey {
        TaskKey::new(self.benchmark.clone(), &self.skew_spec())
    }

    /// Checks the config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty or path-like benchmark
    /// name, a holdout rate outside `[0, 1]` or an invalid skew spec.
    pub fn validate(&self) -> Result<()> {
        if self.benchmark.is_empty() || self.benchmark.contains(['/', '\\']) {
            return Err(Error::configuration(format!(
                "invalid benchmark name {:?}",
                self.benchmark
            )));
        }
        if !(0.0..=1.0).contains(&self.holdout_rate) {
            return Err(Error::configuration(format!(
                "holdout rate must be within [0, 1], got {}",
                self.holdout_rate
            )));
        }
        self.skew_spec().validate()
    }
}

/// Datasets a task is generated from.
#[derive(Debug, Clone)]
pub struct SourceData {
    /// Dataset partitioned among clients.
    pub train: SharedDataset,
    /// Test dataset.
    pub test: SharedDataset,
    /// Description of the datasets, needed for `IDX` tasks.
    pub datasrc: Option<DataSource>,
}

impl SourceData {
    /// In-memory source data.
    pub fn new(train: SharedDataset, test: SharedDataset) -> Self {
        Self {
            train,
            test,
            datasrc: None,
        }
    }

    /// Builds both datasets of `source` and remembers it for `IDX` tasks.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if the source cannot be built.
    pub fn from_registry(registry: &DatasetRegistry, source: DataSource) -> Result<Self> {
        let backing = registry.resolve(&source)?;
        Ok(Self {
            train: backing.train,
            test: backing.test,
            datasrc: Some(source),
        })
    }
}

/// A task written by [`TaskGenerator::run`].
#[derive(Debug, Clone)]
pub struct GeneratedTask {
    /// Task directory.
    pub path: PathBuf,
    /// Client index lists before the holdout.
    pub partition: PartitionResult,
    /// Train/validation indices per client.
    pub holdout: HoldoutResult,
}

/// Result of a generation run.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// A new task was written.
    Generated(Box<GeneratedTask>),
    /// A task with the same key already existed and was left untouched.
    AlreadyExists {
        /// Directory of the existing task.
        path: PathBuf,
    },
}

impl GenerationOutcome {
    /// Task directory, new or existing.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Generated(task) => &task.path,
            Self::AlreadyExists { path } => path,
        }
    }

    /// Whether this run wrote the task.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

/// Generates tasks from a validated [`TaskGenConfig`].
#[derive(Debug, Clone)]
pub struct TaskGenerator {
    config: TaskGenConfig,
    writer: TaskWriter,
}

impl TaskGenerator {
    /// Creates a generator.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn new(config: TaskGenConfig) -> Result<Self> {
        config.validate()?;
        let writer = TaskWriter::new(config.task_root.clone());
        Ok(Self { config, writer })
    }

    /// The config in use.
    #[must_use]
    pub fn config(&self) -> &TaskGenConfig {
        &self.config
    }

    /// Directory the task of this config lives in.
    #[must_use]
    pub fn task_dir(&self) -> PathBuf {
        self.writer.task_dir(&self.config.task_key().name())
    }

    /// Partitions `source`, carves out validation data and saves the task.
    ///
    /// Re-running with the key of an existing task is a no-op.
    ///
    /// # Errors
    ///
    /// Returns partitioning errors, a configuration error for an `IDX` run
    /// without a data source, and persistence errors (after rollback).
    pub fn run(&self, source: &SourceData) -> Result<GenerationOutcome> {
        let name = self.config.task_key().name();
        if self.writer.exists(&name) {
            let path = self.writer.task_dir(&name);
            info!(task = %path.display(), "task already exists, skipping");
            return Ok(GenerationOutcome::AlreadyExists { path });
        }

        let content = match self.config.store {
            StoreMode::Xy => TaskContent::Xy {
                train: source.train.as_ref(),
                test: source.test.as_ref(),
            },
            StoreMode::X => TaskContent::X {
                train: source.train.as_ref(),
                test: source.test.as_ref(),
            },
            StoreMode::Idx => TaskContent::Idx {
                test_len: source.test.len(),
                datasrc: source.datasrc.as_ref().ok_or_else(|| {
                    Error::configuration("IDX tasks need source data built from a DataSource")
                })?,
            },
        };

        let spec = self.config.skew_spec();
        let mut seeds = SeedController::new(spec.seed);
        info!(
            task = %name,
            distribution = %spec.distribution,
            items = source.train.len(),
            "partitioning"
        );
        let partition = Partitioner::new(spec)?.partition(source.train.as_ref(), &mut seeds)?;
        let holdout = holdout::split(
            &partition,
            self.config.holdout_rate,
            self.config.shuffle_holdout,
            seeds.sampling(),
        )?;
        let names = client_names(partition.num_clients());

        match self.writer.save(&name, &holdout, content, &names) {
            Ok(path) => {
                info!(task = %path.display(), clients = names.len(), "task generated");
                Ok(GenerationOutcome::Generated(Box::new(GeneratedTask {
                    path,
                    partition,
                    holdout,
                })))
            }
            Err(Error::TaskAlreadyExists { path }) => {
                info!(task = %path.display(), "task appeared concurrently, skipping");
                Ok(GenerationOutcome::AlreadyExists { path })
            }
            Err(e) => Err(e),
        }
    }
}

//! fedtask - Federated learning task generation in Rust
//!
//! Splits a centralized dataset among simulated clients under a chosen
//! statistical skew, carves per-client validation data, and persists the
//! result as a reproducible on-disk task that training code reads back.
//!
//! # Design Principles
//!
//! 1. **Deterministic** - one seed drives every random choice of a run
//! 2. **Idempotent** - a task is named by its configuration and never
//!    regenerated
//! 3. **Closed resolution** - index-mode tasks rebuild their backing data
//!    through an explicit [`DatasetRegistry`]
//!
//! # Quick Start
//!
//! ```no_run
//! use fedtask::{
//!     DataSource, DatasetRegistry, Distribution, SourceData, TaskGenConfig, TaskGenerator,
//!     TaskReader,
//! };
//!
//! let registry = DatasetRegistry::with_builtins();
//! let source = DataSource::builtin("Synthetic")
//!     .with_train_arg("num_samples", "6000")
//!     .with_test_arg("num_samples", "1000")
//!     .with_test_arg("seed", "1");
//! let data = SourceData::from_registry(&registry, source).unwrap();
//!
//! let config = TaskGenConfig::new("synthetic")
//!     .with_distribution(Distribution::LabelDirichlet, 0.5)
//!     .with_num_clients(10);
//! let outcome = TaskGenerator::new(config).unwrap().run(&data).unwrap();
//!
//! let task = TaskReader::new(&registry).read(outcome.path()).unwrap();
//! for (name, train, valid) in task.clients() {
//!     println!("{name}: {} train / {} valid", train.len(), valid.len());
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_lossless,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::float_cmp,
        clippy::similar_names,
        clippy::unreadable_literal
    )
)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod calculator;
pub mod dataloader;
pub mod dataset;
pub mod datasets;
pub mod error;
pub mod generator;
pub mod holdout;
pub mod partition;
pub mod seed;
pub mod summary;
pub mod task;

pub use calculator::{EvalMetrics, OptimizerKind, OptimizerParams, TaskCalculator};
pub use dataloader::{Batch, DataLoader};
pub use dataset::{
    Dataset, IndexedDataset, Sample, SharedDataset, TupleDataset, XDataset, XyDataset,
};
#[cfg(feature = "table")]
pub use datasets::TableDataset;
pub use datasets::{BackingData, DataSource, DatasetRegistry};
pub use error::{Error, Result};
pub use generator::{GeneratedTask, GenerationOutcome, SourceData, TaskGenConfig, TaskGenerator};
pub use holdout::HoldoutResult;
pub use partition::{Distribution, PartitionResult, Partitioner, SkewSpec};
pub use seed::SeedController;
pub use summary::TaskSummary;
pub use task::{StoreMode, TaskData, TaskKey, TaskReader, TaskRecord, TaskWriter};

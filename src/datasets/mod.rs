//! Backing datasets for index-mode tasks.
//!
//! An index-mode task stores only item indices plus a [`DataSource`]: a
//! class reference and string constructor arguments for the train and test
//! backing datasets. The [`DatasetRegistry`] maps class references to
//! factory functions. The set of constructible datasets is closed: a class
//! reference that was never registered fails to resolve.
//!
//! # Example
//!
//! ```
//! use fedtask::datasets::{DataSource, DatasetRegistry};
//!
//! let registry = DatasetRegistry::with_builtins();
//! let source = DataSource::builtin("Synthetic")
//!     .with_train_arg("num_samples", "200")
//!     .with_test_arg("num_samples", "50")
//!     .with_test_arg("seed", "1");
//! let backing = registry.resolve(&source).unwrap();
//! assert_eq!(backing.train.len(), 200);
//! assert_eq!(backing.test.len(), 50);
//! ```

mod synthetic;
#[cfg(feature = "table")]
mod table;

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use self::synthetic::SyntheticConfig;
#[cfg(feature = "table")]
pub use self::table::TableDataset;
use crate::{
    dataset::SharedDataset,
    error::{Error, Result},
};

/// Class path of the datasets registered by [`DatasetRegistry::with_builtins`].
pub const BUILTIN_CLASS_PATH: &str = "fedtask.datasets";

/// How to rebuild the backing datasets of an index-mode task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Namespace of the dataset class.
    pub class_path: String,
    /// Dataset class within the namespace.
    pub class_name: String,
    /// Constructor arguments of the training dataset.
    #[serde(default)]
    pub train_args: BTreeMap<String, String>,
    /// Constructor arguments of the test dataset.
    #[serde(default)]
    pub test_args: BTreeMap<String, String>,
}

impl DataSource {
    /// A source with no arguments.
    pub fn new(class_path: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            class_path: class_path.into(),
            class_name: class_name.into(),
            train_args: BTreeMap::new(),
            test_args: BTreeMap::new(),
        }
    }

    /// A source referring to one of the builtin datasets.
    pub fn builtin(class_name: impl Into<String>) -> Self {
        Self::new(BUILTIN_CLASS_PATH, class_name)
    }

    /// Adds a training constructor argument.
    #[must_use]
    pub fn with_train_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.train_args.insert(key.into(), value.into());
        self
    }

    /// Adds a test constructor argument.
    #[must_use]
    pub fn with_test_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.test_args.insert(key.into(), value.into());
        self
    }

    /// Fully qualified class reference, `class_path.class_name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class_path, self.class_name)
    }
}

/// Typed read access to string constructor arguments.
#[derive(Debug, Clone, Copy)]
pub struct DatasetArgs<'a> {
    args: &'a BTreeMap<String, String>,
}

impl<'a> DatasetArgs<'a> {
    /// Wraps an argument map.
    #[must_use]
    pub fn new(args: &'a BTreeMap<String, String>) -> Self {
        Self { args }
    }

    /// Raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.args.get(key).map(String::as_str)
    }

    /// Raw value of a mandatory argument.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if `key` is absent.
    pub fn required(&self, key: &str) -> Result<&'a str> {
        self.get(key)
            .ok_or_else(|| Error::dataset_resolution(format!("missing argument `{key}`")))
    }

    /// Parses a mandatory argument.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if `key` is absent or does not parse.
    pub fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.required(key)?;
        raw.trim().parse().map_err(|e: T::Err| {
            Error::dataset_resolution(format!("argument `{key}`={raw:?}: {e}"))
        })
    }

    /// Parses an optional argument, falling back to `default`.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if the argument is present but does not parse.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if self.args.contains_key(key) {
            self.parse(key)
        } else {
            Ok(default)
        }
    }
}

/// Builds a dataset from constructor arguments.
pub type DatasetFactory = Arc<dyn Fn(DatasetArgs<'_>) -> Result<SharedDataset> + Send + Sync>;

/// Train and test backing datasets built from one [`DataSource`].
#[derive(Debug, Clone)]
pub struct BackingData {
    /// Backing dataset of client train/valid views.
    pub train: SharedDataset,
    /// Backing dataset of the test view.
    pub test: SharedDataset,
}

/// Closed mapping from class references to dataset factories.
#[derive(Clone, Default)]
pub struct DatasetRegistry {
    factories: BTreeMap<String, DatasetFactory>,
}

impl DatasetRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the builtin datasets under [`BUILTIN_CLASS_PATH`]:
    /// `Synthetic`, and with the `table` feature `ParquetTable` and `CsvTable`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(BUILTIN_CLASS_PATH, "Synthetic", |args| {
            SyntheticConfig::from_args(args)?.generate()
        });
        #[cfg(feature = "table")]
        {
            registry.register(BUILTIN_CLASS_PATH, "ParquetTable", |args| {
                let dataset = TableDataset::from_parquet(
                    args.required("path")?,
                    args.get("label_column").unwrap_or("label"),
                    args.get("identity_column"),
                )?;
                Ok(Arc::new(dataset) as SharedDataset)
            });
            registry.register(BUILTIN_CLASS_PATH, "CsvTable", |args| {
                let dataset = TableDataset::from_csv(
                    args.required("path")?,
                    args.get("label_column").unwrap_or("label"),
                    args.get("identity_column"),
                )?;
                Ok(Arc::new(dataset) as SharedDataset)
            });
        }
        registry
    }

    /// Registers `factory` under `class_path.class_name`, replacing any
    /// previous entry.
    pub fn register<F>(&mut self, class_path: &str, class_name: &str, factory: F)
    where
        F: Fn(DatasetArgs<'_>) -> Result<SharedDataset> + Send + Sync + 'static,
    {
        self.factories
            .insert(format!("{class_path}.{class_name}"), Arc::new(factory));
    }

    /// Whether `class_path.class_name` is registered.
    #[must_use]
    pub fn contains(&self, class_path: &str, class_name: &str) -> bool {
        self.factories
            .contains_key(&format!("{class_path}.{class_name}"))
    }

    /// Registered class references, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds one dataset of `class_path.class_name`.
    ///
    /// # Errors
    ///
    /// Returns a resolution error for an unregistered class, or whatever the
    /// factory reports.
    pub fn build(
        &self,
        class_path: &str,
        class_name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<SharedDataset> {
        let key = format!("{class_path}.{class_name}");
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| Error::dataset_resolution(format!("unknown dataset class `{key}`")))?;
        debug!(class = %key, ?args, "building backing dataset");
        factory(DatasetArgs::new(args))
    }

    /// Builds the train and test datasets of `source`, once each.
    ///
    /// # Errors
    ///
    /// See [`DatasetRegistry::build`].
    pub fn resolve(&self, source: &DataSource) -> Result<BackingData> {
        let train = self.build(&source.class_path, &source.class_name, &source.train_args)?;
        let test = self.build(&source.class_path, &source.class_name, &source.test_args)?;
        Ok(BackingData { train, test })
    }
}

impl fmt::Debug for DatasetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetRegistry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

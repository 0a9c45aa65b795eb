//! Reading tasks back into datasets.

use std::{fs, path::Path, sync::Arc};

use tracing::info;

use super::{SplitData, StoreMode, TaskRecord, DATA_FILE};
use crate::{
    dataset::{IndexedDataset, SharedDataset, XDataset, XyDataset},
    datasets::{BackingData, DatasetRegistry},
    error::{Error, Result},
};

/// Reads and validates `task_dir/data.json`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read and a malformed-record
/// error if it does not hold a valid record.
pub fn read_record(task_dir: impl AsRef<Path>) -> Result<TaskRecord> {
    let path = task_dir.as_ref().join(DATA_FILE);
    let data = fs::read(&path).map_err(|e| Error::io(e, &path))?;
    TaskRecord::from_slice(&data)
}

/// Datasets of a task, one train and one validation view per client.
#[derive(Debug, Clone)]
pub struct TaskData {
    /// Storage mode the task was read from.
    pub store: StoreMode,
    /// Client names in client order.
    pub client_names: Vec<String>,
    /// Training data per client.
    pub train: Vec<SharedDataset>,
    /// Validation data per client.
    pub valid: Vec<SharedDataset>,
    /// Test data.
    pub test: SharedDataset,
    /// Backing datasets shared by every view (`IDX` only).
    pub backing: Option<BackingData>,
}

impl TaskData {
    /// Number of clients.
    #[must_use]
    pub fn num_clients(&self) -> usize {
        self.client_names.len()
    }

    /// Iterates `(name, train, valid)` per client.
    pub fn clients(&self) -> impl Iterator<Item = (&str, &SharedDataset, &SharedDataset)> {
        self.client_names
            .iter()
            .zip(&self.train)
            .zip(&self.valid)
            .map(|((name, train), valid)| (name.as_str(), train, valid))
    }
}

/// Reads tasks, resolving index-mode backing datasets through a registry.
#[derive(Debug, Clone, Copy)]
pub struct TaskReader<'a> {
    registry: &'a DatasetRegistry,
}

impl<'a> TaskReader<'a> {
    /// A reader resolving backing datasets with `registry`.
    #[must_use]
    pub fn new(registry: &'a DatasetRegistry) -> Self {
        Self { registry }
    }

    /// Reads the task in `task_dir`.
    ///
    /// In `IDX` mode the backing train and test datasets are built once and
    /// every view holds a shared handle to them.
    ///
    /// # Errors
    ///
    /// Returns a malformed-record error for a missing or inconsistent
    /// record, and a resolution error if the backing dataset class is
    /// unknown or fails to build.
    pub fn read(&self, task_dir: impl AsRef<Path>) -> Result<TaskData> {
        let task_dir = task_dir.as_ref();
        let record = read_record(task_dir)?;
        let data = self.materialize(record)?;
        info!(
            task = %task_dir.display(),
            store = %data.store,
            clients = data.num_clients(),
            "task loaded"
        );
        Ok(data)
    }

    /// Turns a validated record into datasets.
    ///
    /// # Errors
    ///
    /// See [`TaskReader::read`].
    pub fn materialize(&self, record: TaskRecord) -> Result<TaskData> {
        record.validate()?;
        let backing = match (&record.store, &record.datasrc) {
            (StoreMode::Idx, Some(source)) => Some(self.registry.resolve(source)?),
            _ => None,
        };

        let TaskRecord {
            store,
            client_names,
            dtest,
            mut clients,
            ..
        } = record;

        let train_backing = backing.as_ref().map(|b| &b.train);
        let test_backing = backing.as_ref().map(|b| &b.test);

        let mut train = Vec::with_capacity(client_names.len());
        let mut valid = Vec::with_capacity(client_names.len());
        for name in &client_names {
            let entry = clients
                .remove(name)
                .ok_or_else(|| Error::malformed(format!("missing entry for client `{name}`")))?;
            train.push(to_dataset(entry.dtrain, train_backing)?);
            valid.push(to_dataset(entry.dvalid, train_backing)?);
        }
        let test = to_dataset(dtest, test_backing)?;

        Ok(TaskData {
            store,
            client_names,
            train,
            valid,
            test,
            backing,
        })
    }
}

fn to_dataset(split: SplitData, backing: Option<&SharedDataset>) -> Result<SharedDataset> {
    match split {
        SplitData::Xy { x, y } => Ok(Arc::new(
            XyDataset::new(x, y).map_err(|e| Error::malformed(e.to_string()))?,
        )),
        SplitData::X { x } => Ok(Arc::new(XDataset::new(x))),
        SplitData::Indices(idxs) => {
            let backing =
                backing.ok_or_else(|| Error::malformed("index split without backing dataset"))?;
            let view = IndexedDataset::new(Arc::clone(backing), idxs)
                .map_err(|e| Error::malformed(e.to_string()))?;
            Ok(Arc::new(view))
        }
    }
}

//! Per-client statistics of a loaded task and access to its experiment logs.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    error::{Error, Result},
    task::{TaskData, RECORD_DIR},
};

/// Item counts per label. Unlabeled items are not counted.
pub type LabelCounts = BTreeMap<i64, usize>;

/// Statistics of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    /// Client name.
    pub name: String,
    /// Training items.
    pub train_size: usize,
    /// Validation items.
    pub valid_size: usize,
    /// Training items per label.
    pub train_labels: LabelCounts,
    /// Validation items per label.
    pub valid_labels: LabelCounts,
}

impl ClientSummary {
    /// Training plus validation items.
    #[must_use]
    pub fn total(&self) -> usize {
        self.train_size + self.valid_size
    }

    /// Number of distinct labels among the client's items.
    #[must_use]
    pub fn num_labels(&self) -> usize {
        self.train_labels
            .keys()
            .chain(self.valid_labels.keys())
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }
}

/// Statistics of a whole task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// One entry per client, in client order.
    pub clients: Vec<ClientSummary>,
    /// Test items.
    pub test_size: usize,
    /// Test items per label.
    pub test_labels: LabelCounts,
}

impl TaskSummary {
    /// Summarizes a loaded task.
    #[must_use]
    pub fn from_task(task: &TaskData) -> Self {
        let clients = task
            .clients()
            .map(|(name, train, valid)| ClientSummary {
                name: name.to_string(),
                train_size: train.len(),
                valid_size: valid.len(),
                train_labels: label_counts(train.as_ref()),
                valid_labels: label_counts(valid.as_ref()),
            })
            .collect();
        Self {
            clients,
            test_size: task.test.len(),
            test_labels: label_counts(task.test.as_ref()),
        }
    }

    /// Items held by all clients together.
    #[must_use]
    pub fn total_client_items(&self) -> usize {
        self.clients.iter().map(ClientSummary::total).sum()
    }

    /// Smallest and largest client volume, if there are clients.
    #[must_use]
    pub fn volume_range(&self) -> Option<(usize, usize)> {
        let min = self.clients.iter().map(ClientSummary::total).min()?;
        let max = self.clients.iter().map(ClientSummary::total).max()?;
        Some((min, max))
    }
}

/// Counts the labels of `dataset`.
#[must_use]
pub fn label_counts(dataset: &dyn Dataset) -> LabelCounts {
    let mut counts = LabelCounts::new();
    for label in (0..dataset.len()).filter_map(|i| dataset.label(i)) {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Files in the `record/` directory of a task, sorted by name.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be listed.
pub fn record_files(task_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = task_dir.as_ref().join(RECORD_DIR);
    let mut files = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| Error::io(e, &dir))? {
        let path = entry.map_err(|e| Error::io(e, &dir))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

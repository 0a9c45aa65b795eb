//! Persisting tasks with directory rollback.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use super::{ClientRecord, SplitData, StoreMode, TaskRecord, DATA_FILE, RECORD_DIR};
use crate::{
    dataset::Dataset,
    datasets::DataSource,
    error::{Error, Result},
    holdout::HoldoutResult,
};

/// Data a task is saved from.
#[derive(Debug, Clone, Copy)]
pub enum TaskContent<'a> {
    /// Copy features and labels of `train` (client splits) and `test` inline.
    Xy {
        /// Dataset the client indices refer to.
        train: &'a dyn Dataset,
        /// Test dataset, stored whole.
        test: &'a dyn Dataset,
    },
    /// Copy features only.
    X {
        /// Dataset the client indices refer to.
        train: &'a dyn Dataset,
        /// Test dataset, stored whole.
        test: &'a dyn Dataset,
    },
    /// Store indices plus the description of the backing datasets.
    Idx {
        /// Length of the backing test dataset.
        test_len: usize,
        /// How to rebuild the backing datasets.
        datasrc: &'a DataSource,
    },
}

impl TaskContent<'_> {
    /// Store mode the content is written in.
    #[must_use]
    pub fn store(&self) -> StoreMode {
        match self {
            Self::Xy { .. } => StoreMode::Xy,
            Self::X { .. } => StoreMode::X,
            Self::Idx { .. } => StoreMode::Idx,
        }
    }

    fn split(&self, idxs: &[usize]) -> Result<SplitData> {
        match *self {
            Self::Xy { train, .. } => xy_split(train, idxs),
            Self::X { train, .. } => Ok(SplitData::X {
                x: rows(train, idxs)?,
            }),
            Self::Idx { .. } => Ok(SplitData::Indices(idxs.to_vec())),
        }
    }

    fn test_split(&self) -> Result<SplitData> {
        match *self {
            Self::Xy { test, .. } => {
                let all: Vec<usize> = (0..test.len()).collect();
                xy_split(test, &all)
            }
            Self::X { test, .. } => {
                let all: Vec<usize> = (0..test.len()).collect();
                Ok(SplitData::X {
                    x: rows(test, &all)?,
                })
            }
            Self::Idx { test_len, .. } => Ok(SplitData::Indices((0..test_len).collect())),
        }
    }

    fn datasrc(&self) -> Option<DataSource> {
        match self {
            Self::Idx { datasrc, .. } => Some((*datasrc).clone()),
            _ => None,
        }
    }
}

// JSON has no NaN or infinity; serde_json would write them as null.
fn rows(dataset: &dyn Dataset, idxs: &[usize]) -> Result<Vec<Vec<f32>>> {
    idxs.iter()
        .map(|&i| {
            let features = dataset
                .get(i)
                .map(|s| s.features)
                .ok_or(Error::IndexOutOfBounds {
                    index: i,
                    len: dataset.len(),
                })?;
            if features.iter().all(|v| v.is_finite()) {
                Ok(features)
            } else {
                Err(Error::unsupported_dataset(format!(
                    "item {i} has a non-finite feature and cannot be stored inline"
                )))
            }
        })
        .collect()
}

fn xy_split(dataset: &dyn Dataset, idxs: &[usize]) -> Result<SplitData> {
    let y = idxs
        .iter()
        .map(|&i| {
            dataset.label(i).ok_or_else(|| {
                Error::unsupported_dataset(format!("item {i} has no label for an XY task"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SplitData::Xy {
        x: rows(dataset, idxs)?,
        y,
    })
}

/// Builds the record of a task.
///
/// # Errors
///
/// Returns an error if the holdout and the client names disagree in length,
/// an index is out of range, or an XY task meets an unlabeled item.
pub fn build_record(
    holdout: &HoldoutResult,
    content: TaskContent<'_>,
    client_names: &[String],
) -> Result<TaskRecord> {
    if holdout.num_clients() != client_names.len() {
        return Err(Error::LengthMismatch {
            what: "client names",
            left: holdout.num_clients(),
            right: client_names.len(),
        });
    }
    let mut clients = BTreeMap::new();
    for (name, (train, valid)) in client_names.iter().zip(holdout.iter()) {
        clients.insert(
            name.clone(),
            ClientRecord {
                dtrain: content.split(train)?,
                dvalid: content.split(valid)?,
            },
        );
    }
    let record = TaskRecord {
        store: content.store(),
        client_names: client_names.to_vec(),
        dtest: content.test_split()?,
        datasrc: content.datasrc(),
        clients,
    };
    record.validate()?;
    Ok(record)
}

/// Writes task directories below a root directory.
#[derive(Debug, Clone)]
pub struct TaskWriter {
    root: PathBuf,
}

impl TaskWriter {
    /// A writer placing tasks below `root` (created on demand).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the task called `name`.
    #[must_use]
    pub fn task_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether a task called `name` already exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.task_dir(name).exists()
    }

    /// Creates the task directory `name` with an empty `record/`
    /// sub-directory and writes `data.json`.
    ///
    /// Returns the task directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskAlreadyExists`] if the directory exists (nothing
    /// is touched). Any later failure removes the directory again and is
    /// reported as [`Error::Persistence`].
    pub fn save(
        &self,
        name: &str,
        holdout: &HoldoutResult,
        content: TaskContent<'_>,
        client_names: &[String],
    ) -> Result<PathBuf> {
        let dir = self.task_dir(name);
        if dir.exists() {
            return Err(Error::TaskAlreadyExists { path: dir });
        }
        fs::create_dir_all(&self.root).map_err(|e| Error::io(e, &self.root))?;
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::TaskAlreadyExists { path: dir });
            }
            Err(e) => return Err(Error::persistence(&dir, e.to_string())),
        }

        match Self::write_contents(&dir, holdout, content, client_names) {
            Ok(bytes) => {
                info!(task = %dir.display(), store = %content.store(), bytes, "task saved");
                Ok(dir)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    warn!(task = %dir.display(), error = %cleanup, "rollback failed");
                }
                Err(Error::persistence(&dir, e.to_string()))
            }
        }
    }

    fn write_contents(
        dir: &Path,
        holdout: &HoldoutResult,
        content: TaskContent<'_>,
        client_names: &[String],
    ) -> Result<usize> {
        let record_dir = dir.join(RECORD_DIR);
        fs::create_dir(&record_dir).map_err(|e| Error::io(e, &record_dir))?;
        let data = build_record(holdout, content, client_names)?.to_vec()?;
        let path = dir.join(DATA_FILE);
        fs::write(&path, &data).map_err(|e| Error::io(e, &path))?;
        Ok(data.len())
    }
}

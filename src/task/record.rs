//! JSON schema of `data.json`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::StoreMode;
use crate::{
    datasets::DataSource,
    error::{Error, Result},
};

/// Top-level keys that cannot be used as client names.
const RESERVED_KEYS: [&str; 4] = ["store", "client_names", "dtest", "datasrc"];

/// The items of one split, in whichever form the store mode dictates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplitData {
    /// Indices into a backing dataset (`IDX`).
    Indices(Vec<usize>),
    /// Inline features and labels (`XY`).
    Xy {
        /// Feature rows.
        x: Vec<Vec<f32>>,
        /// One label per row.
        y: Vec<i64>,
    },
    /// Inline features (`X`).
    X {
        /// Feature rows.
        x: Vec<Vec<f32>>,
    },
}

impl SplitData {
    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Indices(idxs) => idxs.len(),
            Self::Xy { x, .. } | Self::X { x } => x.len(),
        }
    }

    /// Whether the split holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store mode this split is written in.
    #[must_use]
    pub fn store(&self) -> StoreMode {
        match self {
            Self::Indices(_) => StoreMode::Idx,
            Self::Xy { .. } => StoreMode::Xy,
            Self::X { .. } => StoreMode::X,
        }
    }
}

/// Train and validation data of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Training split.
    pub dtrain: SplitData,
    /// Validation split.
    pub dvalid: SplitData,
}

/// Contents of a task's `data.json`.
///
/// Client entries sit at the top level next to the metadata, keyed by
/// client name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Storage mode of every split.
    pub store: StoreMode,
    /// Client names in client order.
    pub client_names: Vec<String>,
    /// Test split.
    pub dtest: SplitData,
    /// Backing dataset description (`IDX` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasrc: Option<DataSource>,
    /// Per-client data keyed by client name.
    #[serde(flatten)]
    pub clients: BTreeMap<String, ClientRecord>,
}

impl TaskRecord {
    /// Parses and validates a record.
    ///
    /// # Errors
    ///
    /// Returns a malformed-record error for invalid JSON, missing fields or
    /// inconsistent contents.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(data).map_err(|e| Error::malformed(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// Returns a malformed-record error if serialization fails.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Entry of the `i`-th client.
    #[must_use]
    pub fn client(&self, i: usize) -> Option<&ClientRecord> {
        self.client_names
            .get(i)
            .and_then(|name| self.clients.get(name))
    }

    /// Checks that client entries match `client_names`, that every split
    /// is stored in `store` mode and that `datasrc` is present exactly in
    /// `IDX` mode.
    ///
    /// # Errors
    ///
    /// Returns a malformed-record error describing the first defect found.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for name in &self.client_names {
            if RESERVED_KEYS.contains(&name.as_str()) {
                return Err(Error::malformed(format!(
                    "client name `{name}` collides with a record field"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::malformed(format!("duplicate client name `{name}`")));
            }
            if !self.clients.contains_key(name) {
                return Err(Error::malformed(format!("missing entry for client `{name}`")));
            }
        }
        if let Some(extra) = self.clients.keys().find(|k| !seen.contains(k.as_str())) {
            return Err(Error::malformed(format!(
                "entry `{extra}` is not listed in client_names"
            )));
        }

        let check = |what: &str, split: &SplitData| {
            if split.store() == self.store {
                Ok(())
            } else {
                Err(Error::malformed(format!(
                    "{what} is stored as {} in a {} record",
                    split.store(),
                    self.store
                )))
            }
        };
        check("dtest", &self.dtest)?;
        for name in &self.client_names {
            if let Some(client) = self.clients.get(name) {
                check(&format!("{name}.dtrain"), &client.dtrain)?;
                check(&format!("{name}.dvalid"), &client.dvalid)?;
            }
        }

        match (self.store, &self.datasrc) {
            (StoreMode::Idx, None) => Err(Error::malformed("IDX record without datasrc")),
            (StoreMode::Xy | StoreMode::X, Some(_)) => Err(Error::malformed(format!(
                "{} record must not carry datasrc",
                self.store
            ))),
            _ => Ok(()),
        }
    }
}

//! Contract between generated tasks and training code.
//!
//! A [`TaskCalculator`] knows how to train and evaluate one model family on
//! the datasets of a task. Everything model specific lives behind its
//! associated types; this crate only relies on the methods below.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    dataloader::{Batch, DataLoader},
    dataset::SharedDataset,
    error::{Error, Result},
};

/// Optimizers a calculator may be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Stochastic gradient descent.
    Sgd,
    /// Adam.
    Adam,
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd),
            "adam" => Ok(Self::Adam),
            other => Err(Error::configuration(format!(
                "unknown optimizer `{other}`, expected sgd or adam"
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sgd => write!(f, "sgd"),
            Self::Adam => write!(f, "adam"),
        }
    }
}

/// Hyper-parameters handed to [`TaskCalculator::create_optimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerParams {
    /// Learning rate.
    pub lr: f64,
    /// L2 penalty.
    pub weight_decay: f64,
    /// Momentum (SGD only).
    pub momentum: f64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            lr: 0.1,
            weight_decay: 0.0,
            momentum: 0.0,
        }
    }
}

impl OptimizerParams {
    /// Sets the learning rate.
    #[must_use]
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Sets the weight decay.
    #[must_use]
    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Sets the momentum.
    #[must_use]
    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }
}

/// Evaluation result of [`TaskCalculator::test`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Fraction of correctly predicted items.
    pub accuracy: f64,
    /// Mean loss.
    pub loss: f64,
}

/// Training and evaluation routines for one model family.
pub trait TaskCalculator {
    /// Model being trained.
    type Model;
    /// Optimizer state bound to a model.
    type Optimizer;

    /// Runs one training step on `batch` and returns its loss.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be used with the model.
    fn train(
        &self,
        model: &mut Self::Model,
        optimizer: &mut Self::Optimizer,
        batch: &Batch,
    ) -> Result<f64>;

    /// Evaluates `model` on `dataset` in batches of `batch_size`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be evaluated.
    fn test(
        &self,
        model: &Self::Model,
        dataset: &SharedDataset,
        batch_size: usize,
    ) -> Result<EvalMetrics>;

    /// Builds an optimizer of `kind` for `model`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the calculator does not support
    /// `kind` or `params`.
    fn create_optimizer(
        &self,
        kind: OptimizerKind,
        model: &Self::Model,
        params: OptimizerParams,
    ) -> Result<Self::Optimizer>;

    /// Builds an optimizer by name (`sgd` or `adam`, any case).
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any other name.
    fn get_optimizer(
        &self,
        name: &str,
        model: &Self::Model,
        params: OptimizerParams,
    ) -> Result<Self::Optimizer> {
        self.create_optimizer(name.parse()?, model, params)
    }

    /// Batches `dataset`.
    fn get_data_loader(
        &self,
        dataset: SharedDataset,
        batch_size: usize,
        shuffle: bool,
    ) -> DataLoader {
        DataLoader::new(dataset)
            .batch_size(batch_size)
            .shuffle(shuffle)
    }
}

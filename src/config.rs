//! Training configuration.
//!
//! Mirrors the JSON parameter files used by GNN benchmarking pipelines:
//!
//! ```json
//! { "epochs": 500, "batch_size": 32768, "init_lr": 0.001,
//!   "lr_reduce_factor": 0.5, "lr_schedule_patience": 10, "min_lr": 1e-5,
//!   "augmentation": 0.0, "seed": 41, "print_epoch_interval": 5 }
//! ```
//!
//! Missing keys fall back to [`TrainingConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of epochs (default: 500).
    pub epochs: usize,
    /// Edges per batch for training and scoring (default: 32768).
    pub batch_size: usize,
    /// Initial learning rate (default: 0.001).
    pub init_lr: f64,
    /// Multiplier applied on a plateau (default: 0.5).
    pub lr_reduce_factor: f64,
    /// Epochs without improvement before reducing the learning rate (default: 10).
    pub lr_schedule_patience: usize,
    /// Training stops once the learning rate drops below this (default: 1e-5).
    pub min_lr: f64,
    /// Eigen-feature rotation magnitude in degrees (default: 0.0, disabled).
    pub augmentation: f64,
    /// Random seed (default: 41).
    pub seed: u64,
    /// Log an epoch summary every this many epochs (default: 5).
    pub print_epoch_interval: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 500,
            batch_size: 32 * 1024,
            init_lr: 1e-3,
            lr_reduce_factor: 0.5,
            lr_schedule_patience: 10,
            min_lr: 1e-5,
            augmentation: 0.0,
            seed: 41,
            print_epoch_interval: 5,
        }
    }
}

impl TrainingConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_init_lr(mut self, lr: f64) -> Self {
        self.init_lr = lr;
        self
    }

    pub fn with_lr_schedule(mut self, factor: f64, patience: usize, min_lr: f64) -> Self {
        self.lr_reduce_factor = factor;
        self.lr_schedule_patience = patience;
        self.min_lr = min_lr;
        self
    }

    pub fn with_augmentation(mut self, magnitude: f64) -> Self {
        self.augmentation = magnitude;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if !(self.init_lr > 0.0 && self.init_lr.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "init_lr must be positive, got {}",
                self.init_lr
            )));
        }
        if !(self.lr_reduce_factor > 0.0 && self.lr_reduce_factor < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "lr_reduce_factor must lie in (0, 1), got {}",
                self.lr_reduce_factor
            )));
        }
        if self.min_lr < 0.0 {
            return Err(Error::InvalidConfig("min_lr must be non-negative".into()));
        }
        if !(self.augmentation >= 0.0 && self.augmentation.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "augmentation must be a non-negative angle, got {}",
                self.augmentation
            )));
        }
        Ok(())
    }
}

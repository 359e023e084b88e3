//! Multi-epoch training driver.
//!
//! Alternates [`train_epoch`] and [`evaluate_network`], reduces the learning
//! rate when validation hits@50 plateaus, and stops once the learning rate
//! falls below `min_lr` or `epochs` is reached.
//!
//! ```rust,ignore
//! use lattix_linkpred::{LinkTrainer, TrainingConfig, HitsEvaluator};
//!
//! let config = TrainingConfig::from_json_file("configs/collab_gcn.json")?;
//! let trainer = LinkTrainer::new(config)?;
//! let (history, _opt) = trainer.fit(&model, opt, &device, &mut graph, &split, &mut HitsEvaluator::default())?;
//! println!("best epoch {}: {:?}", history.best_epoch, history.best_report());
//! ```

use candle_core::Device;
use candle_nn::Optimizer;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::edges::EdgeSplit;
use crate::epoch::{evaluate_network, train_epoch, HitsReport};
use crate::error::{Error, Result};
use crate::evaluator::LinkEvaluator;
use crate::graph::Graph;
use crate::model::LinkPredictionModel;

/// Index of hits@50 within a [`HitsReport`] triple; drives scheduling.
const MONITOR: usize = 1;

/// Relative improvement needed to reset the plateau counter.
const PLATEAU_THRESHOLD: f64 = 1e-4;

/// Reduce-on-plateau learning-rate schedule for a metric to maximise.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    factor: f64,
    patience: usize,
    best: Option<f64>,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(factor: f64, patience: usize) -> Self {
        Self {
            factor,
            patience,
            best: None,
            bad_epochs: 0,
        }
    }

    /// Record `metric` and return the learning rate to use next.
    pub fn step(&mut self, metric: f64, lr: f64) -> f64 {
        let improved = match self.best {
            None => true,
            Some(best) => metric > best * (1.0 + PLATEAU_THRESHOLD),
        };
        if improved {
            self.best = Some(metric);
            self.bad_epochs = 0;
            return lr;
        }

        self.bad_epochs += 1;
        if self.bad_epochs > self.patience {
            self.bad_epochs = 0;
            lr * self.factor
        } else {
            lr
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

/// Per-epoch record of a training run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    pub hits: Vec<HitsReport>,
    pub learning_rate: Vec<f64>,
    /// Epoch with the highest validation hits@50.
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.loss.len()
    }

    pub fn best_report(&self) -> Option<&HitsReport> {
        self.hits.get(self.best_epoch)
    }

    fn record(&mut self, loss: f64, report: HitsReport, lr: f64) {
        let is_best = self
            .best_report()
            .map_or(true, |best| report.valid[MONITOR] > best.valid[MONITOR]);
        self.loss.push(loss);
        self.hits.push(report);
        self.learning_rate.push(lr);
        if is_best {
            self.best_epoch = self.hits.len() - 1;
        }
    }
}

pub struct LinkTrainer {
    config: TrainingConfig,
}

impl LinkTrainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train until the epoch budget or the learning-rate floor is reached.
    ///
    /// The optimizer's learning rate is reset to `init_lr` first.
    pub fn fit<M, O, E>(
        &self,
        model: &M,
        mut optimizer: O,
        device: &Device,
        graph: &mut Graph,
        split: &EdgeSplit,
        evaluator: &mut E,
    ) -> Result<(TrainingHistory, O)>
    where
        M: LinkPredictionModel + ?Sized,
        O: Optimizer,
        E: LinkEvaluator + ?Sized,
    {
        let cfg = &self.config;
        if split.train_pos.is_empty() {
            return Err(Error::EmptyEdgeSet("train_pos"));
        }
        split.check_nodes(graph.num_nodes())?;

        let mut rng = XorShiftRng::seed_from_u64(cfg.seed);
        let mut scheduler = PlateauScheduler::new(cfg.lr_reduce_factor, cfg.lr_schedule_patience);
        let mut history = TrainingHistory::default();
        optimizer.set_learning_rate(cfg.init_lr);

        info!(
            nodes = graph.num_nodes(),
            train_edges = split.train_pos.len(),
            epochs = cfg.epochs,
            "starting link prediction training"
        );

        for epoch in 0..cfg.epochs {
            let (loss, opt) = train_epoch(
                model,
                optimizer,
                device,
                graph,
                &split.train_pos,
                cfg.batch_size,
                epoch,
                cfg.augmentation,
                &mut rng,
            )?;
            optimizer = opt;

            let report =
                evaluate_network(model, device, graph, split, evaluator, cfg.batch_size, epoch)?;
            let lr = optimizer.learning_rate();
            history.record(loss, report, lr);

            if cfg.print_epoch_interval > 0 && epoch % cfg.print_epoch_interval == 0 {
                info!(
                    epoch,
                    loss,
                    lr,
                    valid_hits50 = report.valid[MONITOR],
                    test_hits50 = report.test[MONITOR],
                    "epoch summary"
                );
            }

            let next_lr = scheduler.step(report.valid[MONITOR], lr);
            if next_lr < lr {
                info!(epoch, from = lr, to = next_lr, "reducing learning rate");
                optimizer.set_learning_rate(next_lr);
            }
            if optimizer.learning_rate() < cfg.min_lr {
                warn!(epoch, lr = optimizer.learning_rate(), "learning rate below min_lr, stopping");
                break;
            }
        }

        if let Some(best) = history.best_report() {
            info!(best_epoch = history.best_epoch, "{}", best.summary());
        }
        Ok((history, optimizer))
    }
}

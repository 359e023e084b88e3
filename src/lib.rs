//! `lattix-linkpred`: link prediction training and evaluation for GNNs.
//!
//! Given a graph with node features and a train/valid/test split of edges,
//! the crate runs epochs of mini-batch training with uniform negative
//! sampling and evaluates with hits@K against a shared pool of negatives.
//!
//! ## Pieces
//!
//! | Item | Role |
//! |------|------|
//! | [`Graph`] | Named node/edge tensors and normalised adjacency |
//! | [`EdgeList`], [`EdgeSplit`] | Positive and negative edges per split |
//! | [`LinkPredictionModel`] | Node embedding, edge scoring and loss |
//! | [`train_epoch`] | One pass of gradient updates |
//! | [`evaluate_network`] | hits@{10, 50, 100} for train/valid/test |
//! | [`LinkTrainer`] | Epoch loop with reduce-on-plateau scheduling |
//!
//! ## Augmentation
//!
//! Laplacian eigenvectors used as positional encodings are ambiguous up to
//! rotation. With `augmentation > 0`, [`train_epoch`] rotates eigen channels
//! 1 and 2 by a random per-node angle for each batch and restores them
//! afterwards (see [`augment`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use candle_core::{DType, Device};
//! use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
//! use lattix_linkpred::{GcnLinkConfig, GcnLinkModel, HitsEvaluator, train_epoch, evaluate_network};
//!
//! let device = Device::Cpu;
//! let varmap = VarMap::new();
//! let model = GcnLinkModel::new(GcnLinkConfig::default(), VarBuilder::from_varmap(&varmap, DType::F32, &device))?;
//! let opt = AdamW::new(varmap.all_vars(), ParamsAdamW::default())?;
//!
//! let (loss, opt) = train_epoch(&model, opt, &device, &mut graph, &split.train_pos, 1024, 0, 0.0, &mut rng)?;
//! let hits = evaluate_network(&model, &device, &graph, &split, &mut HitsEvaluator::default(), 1024, 0)?;
//! ```

pub mod augment;
pub mod config;
pub mod edges;
pub mod epoch;
mod error;
pub mod evaluator;
pub mod graph;
pub mod model;
pub mod nn;
pub mod sampling;
pub mod trainer;

pub use augment::{EigenAugmentation, AUGMENTATION_EPSILON};
pub use config::TrainingConfig;
pub use edges::{EdgeList, EdgeSplit};
pub use epoch::{evaluate_network, predict_scores, train_epoch, HitsReport};
pub use error::{Error, Result};
pub use evaluator::{EvalInput, HitsEvaluator, LinkEvaluator, HITS_AT};
pub use graph::{Graph, EIG, FEAT};
pub use model::LinkPredictionModel;
pub use nn::{GcnLinkConfig, GcnLinkModel};
pub use trainer::{LinkTrainer, PlateauScheduler, TrainingHistory};

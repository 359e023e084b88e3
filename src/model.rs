//! The model seam used by the epoch routines.

use candle_core::{Result, Tensor};

use crate::graph::Graph;

/// A GNN that embeds nodes and scores candidate edges.
///
/// Parameters are expected to live in `candle_nn::Var`s so that an optimizer
/// can update them through a shared reference.
pub trait LinkPredictionModel {
    /// Node embeddings `(N, hidden)` from node features `x` and optional
    /// edge features `e`. `train` enables dropout and similar behaviour.
    fn forward_t(&self, graph: &Graph, x: &Tensor, e: Option<&Tensor>, train: bool)
        -> Result<Tensor>;

    /// Edge scores for aligned rows of source and destination embeddings.
    fn edge_predictor(&self, h_src: &Tensor, h_dst: &Tensor) -> Result<Tensor>;

    /// Scalar loss from positive and negative edge scores.
    fn loss(&self, pos_out: &Tensor, neg_out: &Tensor) -> Result<Tensor>;

    /// Inference-mode forward pass.
    fn forward(&self, graph: &Graph, x: &Tensor, e: Option<&Tensor>) -> Result<Tensor> {
        self.forward_t(graph, x, e, false)
    }
}

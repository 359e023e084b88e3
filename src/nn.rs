//! Reference GCN link-prediction model.
//!
//! - [`GCNConv`]: `H' = A_hat H W` (Kipf & Welling, 2017)
//! - [`MlpPredictor`]: scores an edge from the Hadamard product of its
//!   endpoint embeddings
//! - [`GcnLinkModel`]: input projection, stacked GCN layers and predictor,
//!   implementing [`LinkPredictionModel`]
//!
//! Optionally the first `pe_dim` Laplacian eigen channels are concatenated to
//! the node features as positional encodings, which is what makes
//! [`crate::augment`] meaningful for this model.

use candle_core::{DType, Result, Tensor, D};
use candle_nn::{linear, ops, Linear, Module, VarBuilder};

use crate::graph::{Graph, EIG};
use crate::model::LinkPredictionModel;

/// Graph Convolutional Network layer.
///
/// Implements `A_hat * (X W)` where `A_hat` is the normalised adjacency with
/// self loops stored on the [`Graph`].
pub struct GCNConv {
    linear: Linear,
}

impl GCNConv {
    pub fn new(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Self> {
        let linear = linear(in_features, out_features, vb)?;
        Ok(Self { linear })
    }

    /// `x`: node features `(N, in)`, `adj`: normalised adjacency `(N, N)`.
    pub fn forward(&self, x: &Tensor, adj: &Tensor) -> Result<Tensor> {
        let h = self.linear.forward(x)?;
        adj.matmul(&h)
    }
}

/// Two-layer MLP over `h_src * h_dst`, one logit per edge.
pub struct MlpPredictor {
    hidden: Linear,
    out: Linear,
}

impl MlpPredictor {
    pub fn new(dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            hidden: linear(dim, dim, vb.pp("hidden"))?,
            out: linear(dim, 1, vb.pp("out"))?,
        })
    }

    pub fn forward(&self, h_src: &Tensor, h_dst: &Tensor) -> Result<Tensor> {
        let h = (h_src * h_dst)?;
        let h = self.hidden.forward(&h)?.relu()?;
        self.out.forward(&h)
    }
}

/// Hyperparameters for [`GcnLinkModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcnLinkConfig {
    /// Width of `ndata["feat"]`.
    pub in_dim: usize,
    /// Eigen channels appended to the input (0 disables).
    pub pe_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    /// Dropout probability applied after each GCN layer in training mode.
    pub dropout: f32,
}

impl Default for GcnLinkConfig {
    fn default() -> Self {
        Self {
            in_dim: 128,
            pe_dim: 0,
            hidden_dim: 74,
            num_layers: 3,
            dropout: 0.0,
        }
    }
}

pub struct GcnLinkModel {
    embedding: Linear,
    layers: Vec<GCNConv>,
    predictor: MlpPredictor,
    pe_dim: usize,
    dropout: f32,
}

impl GcnLinkModel {
    pub fn new(config: GcnLinkConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = linear(
            config.in_dim + config.pe_dim,
            config.hidden_dim,
            vb.pp("embedding"),
        )?;
        let layers = (0..config.num_layers)
            .map(|i| GCNConv::new(config.hidden_dim, config.hidden_dim, vb.pp(format!("gcn{i}"))))
            .collect::<Result<Vec<_>>>()?;
        let predictor = MlpPredictor::new(config.hidden_dim, vb.pp("predictor"))?;
        Ok(Self {
            embedding,
            layers,
            predictor,
            pe_dim: config.pe_dim,
            dropout: config.dropout,
        })
    }

    fn input(&self, graph: &Graph, x: &Tensor) -> Result<Tensor> {
        let x = x.to_dtype(DType::F32)?;
        if self.pe_dim == 0 {
            return Ok(x);
        }
        let eig = graph
            .node_data(EIG)
            .ok_or_else(|| candle_core::Error::Msg(format!("ndata[{EIG:?}] is required")))?;
        let pe = eig.narrow(D::Minus1, 0, self.pe_dim)?.to_dtype(DType::F32)?;
        Tensor::cat(&[&x, &pe], D::Minus1)
    }
}

impl LinkPredictionModel for GcnLinkModel {
    fn forward_t(
        &self,
        graph: &Graph,
        x: &Tensor,
        _e: Option<&Tensor>,
        train: bool,
    ) -> Result<Tensor> {
        let mut h = self.embedding.forward(&self.input(graph, x)?)?;
        for layer in &self.layers {
            h = layer.forward(&h, graph.adjacency())?.relu()?;
            if train && self.dropout > 0.0 {
                h = ops::dropout(&h, self.dropout)?;
            }
        }
        Ok(h)
    }

    fn edge_predictor(&self, h_src: &Tensor, h_dst: &Tensor) -> Result<Tensor> {
        self.predictor.forward(h_src, h_dst)
    }

    fn loss(&self, pos_out: &Tensor, neg_out: &Tensor) -> Result<Tensor> {
        link_loss(pos_out, neg_out)
    }
}

/// Binary cross-entropy over edge logits:
///
/// ```text
/// -mean(log(sigmoid(pos) + 1e-15)) - mean(log(1 - sigmoid(neg) + 1e-15))
/// ```
///
/// `1 - sigmoid(x)` is evaluated as `sigmoid(-x)`.
pub fn link_loss(pos_out: &Tensor, neg_out: &Tensor) -> Result<Tensor> {
    let pos_loss = ops::sigmoid(pos_out)?
        .affine(1.0, 1e-15)?
        .log()?
        .mean_all()?
        .neg()?;
    let neg_loss = ops::sigmoid(&neg_out.neg()?)?
        .affine(1.0, 1e-15)?
        .log()?
        .mean_all()?
        .neg()?;
    pos_loss + neg_loss
}

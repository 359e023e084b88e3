//! One training epoch and one evaluation pass.
//!
//! # Training
//!
//! For each shuffled batch of positive training edges:
//! 1. Rotate eigen features (if augmentation is active)
//! 2. Embed nodes, score positives and an equal number of uniform negatives
//! 3. One optimizer step on the model loss
//! 4. Restore the eigen features
//!
//! The epoch loss is the batch-size-weighted mean of batch losses.
//!
//! # Evaluation
//!
//! Nodes are embedded once, edges are scored in sequential batches, and
//! hits@{10, 50, 100} are computed for three comparisons:
//!
//! | Report | Positives | Negatives |
//! |--------|-----------|-----------|
//! | `train` | train | **valid** |
//! | `valid` | valid | valid |
//! | `test` | test | test |
//!
//! There are no held-out negatives for the training edges, so the
//! validation negatives stand in.

use candle_core::{DType, Device, Tensor};
use candle_nn::Optimizer;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::augment::EigenAugmentation;
use crate::edges::{batch_indices, shuffled_batch_indices, EdgeList, EdgeSplit};
use crate::error::{Error, Result};
use crate::evaluator::{hits_key, EvalInput, LinkEvaluator, HITS_AT};
use crate::graph::{Graph, FEAT};
use crate::model::LinkPredictionModel;
use crate::sampling::uniform_negatives;

/// hits@{10, 50, 100} for the three comparisons of an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HitsReport {
    pub train: [f64; 3],
    pub valid: [f64; 3],
    pub test: [f64; 3],
}

impl HitsReport {
    /// Format as summary string.
    pub fn summary(&self) -> String {
        let fmt = |h: &[f64; 3]| format!("{:.4}/{:.4}/{:.4}", h[0], h[1], h[2]);
        format!(
            "H@10/50/100 train: {} | valid: {} | test: {}",
            fmt(&self.train),
            fmt(&self.valid),
            fmt(&self.test)
        )
    }
}

/// Run one training epoch and return the weighted mean loss and the optimizer.
///
/// `graph` is moved to `device` in place. When `augmentation` exceeds
/// [`crate::augment::AUGMENTATION_EPSILON`] its eigen features are rotated
/// for each batch and restored afterwards, also on error.
///
/// Returns [`Error::EmptyEdgeSet`] when `train_edges` is empty.
#[allow(clippy::too_many_arguments)]
pub fn train_epoch<M, O, R>(
    model: &M,
    mut optimizer: O,
    device: &Device,
    graph: &mut Graph,
    train_edges: &EdgeList,
    batch_size: usize,
    epoch: usize,
    augmentation: f64,
    rng: &mut R,
) -> Result<(f64, O)>
where
    M: LinkPredictionModel + ?Sized,
    O: Optimizer,
    R: Rng + ?Sized,
{
    if train_edges.is_empty() {
        return Err(Error::EmptyEdgeSet("train_pos"));
    }
    graph.move_to(device)?;
    let augment = EigenAugmentation::new(augmentation);

    let mut total_loss = 0.0;
    let mut total_examples = 0usize;

    let batches = shuffled_batch_indices(train_edges.len(), batch_size, rng)?;
    for (step, perm) in batches.iter().enumerate() {
        let pos = train_edges.select(perm);

        let loss = {
            let view = augment.apply(graph, rng)?;
            let (x, e) = input_features(&view)?;
            let h = model.forward_t(&view, &x, e.as_ref(), true)?;

            let pos_out = score_edges(model, &h, &pos, device)?;
            let neg = uniform_negatives(view.num_nodes(), pos.len(), rng)?;
            let neg_out = score_edges(model, &h, &neg, device)?;

            model.loss(&pos_out, &neg_out)?
        };

        optimizer.backward_step(&loss)?;

        let batch_loss = f64::from(loss.to_dtype(DType::F32)?.to_scalar::<f32>()?);
        total_loss += batch_loss * pos.len() as f64;
        total_examples += pos.len();
        debug!(epoch, step, batch_loss, "train batch");
    }

    let mean_loss = total_loss / total_examples as f64;
    debug!(epoch, mean_loss, batches = batches.len(), "train epoch done");
    Ok((mean_loss, optimizer))
}

/// Score all edge sets of `split` and compute hits@{10, 50, 100}.
///
/// The model runs in inference mode and its embeddings are detached, so no
/// gradient graph is built. `evaluator`'s K is left at the last value.
pub fn evaluate_network<M, E>(
    model: &M,
    device: &Device,
    graph: &Graph,
    split: &EdgeSplit,
    evaluator: &mut E,
    batch_size: usize,
    epoch: usize,
) -> Result<HitsReport>
where
    M: LinkPredictionModel + ?Sized,
    E: LinkEvaluator + ?Sized,
{
    let graph = graph.to_device(device)?;
    let (x, e) = input_features(&graph)?;
    let h = model.forward_t(&graph, &x, e.as_ref(), false)?.detach();

    let pos_train = predict_scores(model, &h, &split.train_pos, batch_size, device)?;
    let pos_valid = predict_scores(model, &h, &split.valid_pos, batch_size, device)?;
    let neg_valid = predict_scores(model, &h, &split.valid_neg, batch_size, device)?;
    let pos_test = predict_scores(model, &h, &split.test_pos, batch_size, device)?;
    let neg_test = predict_scores(model, &h, &split.test_neg, batch_size, device)?;

    let report = HitsReport {
        train: hits_triple(evaluator, &pos_train, &neg_valid)?,
        valid: hits_triple(evaluator, &pos_valid, &neg_valid)?,
        test: hits_triple(evaluator, &pos_test, &neg_test)?,
    };
    info!(epoch, "{}", report.summary());
    Ok(report)
}

/// Edge scores for `edges` computed in sequential batches, gathered on the host.
pub fn predict_scores<M>(
    model: &M,
    h: &Tensor,
    edges: &EdgeList,
    batch_size: usize,
    device: &Device,
) -> Result<Vec<f32>>
where
    M: LinkPredictionModel + ?Sized,
{
    let mut scores = Vec::with_capacity(edges.len());
    for perm in batch_indices(edges.len(), batch_size)? {
        let out = score_edges(model, h, &edges.select(&perm), device)?;
        scores.extend(out.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?);
    }
    Ok(scores)
}

fn score_edges<M>(model: &M, h: &Tensor, edges: &EdgeList, device: &Device) -> Result<Tensor>
where
    M: LinkPredictionModel + ?Sized,
{
    let (src, dst) = edges.src_dst_tensors(device)?;
    let h_src = h.index_select(&src, 0)?;
    let h_dst = h.index_select(&dst, 0)?;
    Ok(model.edge_predictor(&h_src, &h_dst)?)
}

/// Node features and, when stored, edge features cast to f32.
fn input_features(graph: &Graph) -> Result<(Tensor, Option<Tensor>)> {
    let x = graph.try_node_data(FEAT)?.clone();
    let e = graph
        .edge_data(FEAT)
        .map(|e| e.to_dtype(DType::F32))
        .transpose()?;
    Ok((x, e))
}

fn hits_triple<E>(evaluator: &mut E, pos: &[f32], neg: &[f32]) -> Result<[f64; 3]>
where
    E: LinkEvaluator + ?Sized,
{
    let mut out = [0.0; 3];
    for (slot, k) in out.iter_mut().zip(HITS_AT) {
        evaluator.set_k(k);
        let key = hits_key(k);
        let metrics = evaluator.eval(&EvalInput {
            y_pred_pos: pos,
            y_pred_neg: neg,
        })?;
        *slot = *metrics.get(&key).ok_or(Error::MissingMetric(key))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::HitsEvaluator;
    use crate::nn::{GcnLinkConfig, GcnLinkModel};
    use candle_core::backprop::GradStore;
    use candle_core::Var;
    use candle_nn::{VarBuilder, VarMap, SGD};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    /// SGD that counts its steps.
    struct CountingSgd {
        inner: SGD,
        steps: usize,
    }

    impl Optimizer for CountingSgd {
        type Config = f64;

        fn new(vars: Vec<Var>, lr: f64) -> candle_core::Result<Self> {
            Ok(Self {
                inner: SGD::new(vars, lr)?,
                steps: 0,
            })
        }

        fn step(&mut self, grads: &GradStore) -> candle_core::Result<()> {
            self.steps += 1;
            self.inner.step(grads)
        }

        fn learning_rate(&self) -> f64 {
            self.inner.learning_rate()
        }

        fn set_learning_rate(&mut self, lr: f64) {
            self.inner.set_learning_rate(lr)
        }
    }

    /// Model whose loss is the mean positive score, recording batch sizes.
    struct ProbeModel {
        weight: Var,
        batch_sizes: std::cell::RefCell<Vec<(usize, usize)>>,
        seen_eig: std::cell::RefCell<Vec<Vec<Vec<f32>>>>,
    }

    impl LinkPredictionModel for ProbeModel {
        fn forward_t(
            &self,
            graph: &Graph,
            x: &Tensor,
            _e: Option<&Tensor>,
            _train: bool,
        ) -> candle_core::Result<Tensor> {
            if let Some(eig) = graph.node_data(crate::graph::EIG) {
                self.seen_eig.borrow_mut().push(eig.to_vec2::<f32>()?);
            }
            x.broadcast_mul(self.weight.as_tensor())
        }

        fn edge_predictor(&self, h_src: &Tensor, h_dst: &Tensor) -> candle_core::Result<Tensor> {
            (h_src + h_dst)?.sum_keepdim(1)
        }

        fn loss(&self, pos_out: &Tensor, neg_out: &Tensor) -> candle_core::Result<Tensor> {
            self.batch_sizes
                .borrow_mut()
                .push((pos_out.dim(0)?, neg_out.dim(0)?));
            pos_out.mean_all()
        }
    }

    fn ring_graph(n: u32) -> (Graph, EdgeList) {
        let device = Device::Cpu;
        let edges: EdgeList = (0..n).map(|i| (i, (i + 1) % n)).collect();
        let mut graph = Graph::from_edges(n as usize, &edges, &device).unwrap();
        let ids: Vec<f32> = (0..n).map(|i| i as f32).collect();
        graph
            .set_node_data(FEAT, Tensor::from_vec(ids, (n as usize, 1), &device).unwrap())
            .unwrap();
        graph
            .set_node_data(
                crate::graph::EIG,
                Tensor::randn(0f32, 1f32, (n as usize, 4), &device).unwrap(),
            )
            .unwrap();
        (graph, edges)
    }

    fn probe() -> ProbeModel {
        ProbeModel {
            weight: Var::ones((1, 1), DType::F32, &Device::Cpu).unwrap(),
            batch_sizes: Default::default(),
            seen_eig: Default::default(),
        }
    }

    #[test]
    fn test_step_count_and_negative_shape() {
        let (mut graph, edges) = ring_graph(10);
        let model = probe();
        let opt = CountingSgd::new(vec![model.weight.clone()], 0.0).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(42);

        let (_, opt) =
            train_epoch(&model, opt, &Device::Cpu, &mut graph, &edges, 4, 0, 0.0, &mut rng).unwrap();

        assert_eq!(opt.steps, 3);
        let sizes = model.batch_sizes.borrow();
        let pos_sizes: Vec<usize> = sizes.iter().map(|&(p, _)| p).collect();
        assert_eq!(pos_sizes, vec![4, 4, 2]);
        assert!(sizes.iter().all(|&(p, n)| p == n));
    }

    #[test]
    fn test_weighted_mean_loss() {
        // lr = 0 keeps the weight at 1, so each batch loss is the mean of
        // (x_src + x_dst) over the batch and the weighted mean over the epoch
        // is the mean over all edges.
        let (mut graph, edges) = ring_graph(7);
        let model = probe();
        let opt = CountingSgd::new(vec![model.weight.clone()], 0.0).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(9);

        let (loss, _) =
            train_epoch(&model, opt, &Device::Cpu, &mut graph, &edges, 3, 0, 0.0, &mut rng).unwrap();

        let expected: f64 = edges
            .iter()
            .map(|&(s, d)| f64::from(s + d))
            .sum::<f64>()
            / edges.len() as f64;
        assert!((loss - expected).abs() < 1e-4, "loss={loss} expected={expected}");
    }

    #[test]
    fn test_augmentation_restores_eig() {
        let (mut graph, edges) = ring_graph(8);
        let before = graph.node_data(crate::graph::EIG).unwrap().to_vec2::<f32>().unwrap();
        let model = probe();
        let opt = CountingSgd::new(vec![model.weight.clone()], 0.01).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(5);

        train_epoch(&model, opt, &Device::Cpu, &mut graph, &edges, 3, 1, 45.0, &mut rng).unwrap();

        let after = graph.node_data(crate::graph::EIG).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_training_edges() {
        let (mut graph, _) = ring_graph(4);
        let model = probe();
        let opt = CountingSgd::new(vec![model.weight.clone()], 0.1).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(0);

        let err = train_epoch(
            &model,
            opt,
            &Device::Cpu,
            &mut graph,
            &EdgeList::default(),
            4,
            0,
            0.0,
            &mut rng,
        )
        .err();
        assert!(matches!(err, Some(Error::EmptyEdgeSet(_))));
    }

    #[test]
    fn test_evaluate_network_perfect_separation() {
        // Probe scores are x_src + x_dst with x = node id: positives touch the
        // high ids, negatives the low ones.
        let (graph, _) = ring_graph(200);
        let model = probe();
        let high: EdgeList = (150..200).map(|i| (i, i)).collect();
        let low: EdgeList = (0..120).map(|i| (i, 0)).collect();
        let split = EdgeSplit {
            train_pos: high.clone(),
            valid_pos: high.clone(),
            valid_neg: low.clone(),
            test_pos: high,
            test_neg: low,
        };
        let mut evaluator = HitsEvaluator::default();

        let report =
            evaluate_network(&model, &Device::Cpu, &graph, &split, &mut evaluator, 16, 0).unwrap();

        assert_eq!(report.train, [1.0; 3]);
        assert_eq!(report.valid, [1.0; 3]);
        assert_eq!(report.test, [1.0; 3]);
    }

    #[test]
    fn test_train_hits_use_validation_negatives() {
        // Valid negatives score below every positive, test negatives above.
        let (graph, _) = ring_graph(200);
        let model = probe();
        let high: EdgeList = (150..200).map(|i| (i, i)).collect();
        let split = EdgeSplit {
            train_pos: high.clone(),
            valid_pos: high.clone(),
            valid_neg: (0..120).map(|i| (i, 0)).collect(),
            test_pos: high,
            test_neg: (0..120).map(|_| (199, 199)).collect(),
        };
        let mut evaluator = HitsEvaluator::default();

        let report =
            evaluate_network(&model, &Device::Cpu, &graph, &split, &mut evaluator, 16, 0).unwrap();

        assert_eq!(report.train, report.valid);
        assert_eq!(report.train, [1.0; 3]);
        assert_eq!(report.test, [0.0; 3]);
        assert_ne!(report.train, report.test);
    }

    #[test]
    fn test_model_sees_rotated_eig_only_when_active() {
        let (mut graph, edges) = ring_graph(8);
        let original = graph.node_data(crate::graph::EIG).unwrap().to_vec2::<f32>().unwrap();

        let model = probe();
        let opt = CountingSgd::new(vec![model.weight.clone()], 0.0).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(11);
        train_epoch(&model, opt, &Device::Cpu, &mut graph, &edges, 3, 0, 45.0, &mut rng).unwrap();
        {
            let seen = model.seen_eig.borrow();
            assert_eq!(seen.len(), 3);
            assert!(seen.iter().all(|eig| *eig != original));
        }

        let model = probe();
        let opt = CountingSgd::new(vec![model.weight.clone()], 0.0).unwrap();
        train_epoch(&model, opt, &Device::Cpu, &mut graph, &edges, 3, 0, 1e-7, &mut rng).unwrap();
        let seen = model.seen_eig.borrow();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|eig| *eig == original));
    }

    #[test]
    fn test_predict_scores_order_and_length() {
        let (graph, _) = ring_graph(10);
        let model = probe();
        let x = graph.node_data(FEAT).unwrap();
        let h = model.forward(&graph, x, None).unwrap();
        let edges = EdgeList::new(vec![(1, 2), (3, 4), (9, 9), (0, 0), (5, 0)]);

        let scores = predict_scores(&model, &h, &edges, 2, &Device::Cpu).unwrap();
        assert_eq!(scores, vec![3.0, 7.0, 18.0, 0.0, 5.0]);
    }

    #[test]
    fn test_gcn_model_epoch_runs() {
        let device = Device::Cpu;
        let (mut graph, edges) = ring_graph(12);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = GcnLinkModel::new(
            GcnLinkConfig {
                in_dim: 1,
                pe_dim: 3,
                hidden_dim: 8,
                num_layers: 2,
                dropout: 0.0,
            },
            vb,
        )
        .unwrap();
        let opt = SGD::new(varmap.all_vars(), 0.01).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(1);

        let (loss, _) =
            train_epoch(&model, opt, &device, &mut graph, &edges, 5, 0, 10.0, &mut rng).unwrap();
        assert!(loss.is_finite());
    }
}

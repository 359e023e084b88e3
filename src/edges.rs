//! Edge lists, edge splits and mini-batch index generation.

use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};

/// Ordered list of `(src, dst)` node-index pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeList {
    edges: Vec<(u32, u32)>,
}

impl EdgeList {
    pub fn new(edges: Vec<(u32, u32)>) -> Self {
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn as_slice(&self) -> &[(u32, u32)] {
        &self.edges
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u32, u32)> {
        self.edges.iter()
    }

    /// Gather the edges at `indices`, in that order.
    ///
    /// Panics if an index is out of bounds; indices come from
    /// [`batch_indices`] over `0..self.len()`.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            edges: indices.iter().map(|&i| self.edges[i]).collect(),
        }
    }

    /// Largest node index referenced, if any.
    pub fn max_node_index(&self) -> Option<u32> {
        self.edges.iter().map(|&(s, d)| s.max(d)).max()
    }

    /// Split into source and destination index tensors of shape `(len,)`.
    pub fn src_dst_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let (src, dst): (Vec<u32>, Vec<u32>) = self.edges.iter().copied().unzip();
        let n = src.len();
        let src = Tensor::from_vec(src, n, device)?;
        let dst = Tensor::from_vec(dst, n, device)?;
        Ok((src, dst))
    }
}

impl From<Vec<(u32, u32)>> for EdgeList {
    fn from(edges: Vec<(u32, u32)>) -> Self {
        Self::new(edges)
    }
}

impl FromIterator<(u32, u32)> for EdgeList {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Train/valid/test split of positive and negative edges.
#[derive(Debug, Clone, Default)]
pub struct EdgeSplit {
    pub train_pos: EdgeList,
    pub valid_pos: EdgeList,
    pub valid_neg: EdgeList,
    pub test_pos: EdgeList,
    pub test_neg: EdgeList,
}

impl EdgeSplit {
    /// Check that every edge endpoint is a node of a graph with `num_nodes` nodes.
    pub fn check_nodes(&self, num_nodes: usize) -> Result<()> {
        for list in [
            &self.train_pos,
            &self.valid_pos,
            &self.valid_neg,
            &self.test_pos,
            &self.test_neg,
        ] {
            if let Some(index) = list.max_node_index() {
                if index as usize >= num_nodes {
                    return Err(Error::NodeOutOfRange { index, num_nodes });
                }
            }
        }
        Ok(())
    }
}

/// Sequential batches over `0..n`, `ceil(n / batch_size)` of them.
pub fn batch_indices(n: usize, batch_size: usize) -> Result<Vec<Vec<usize>>> {
    let order: Vec<usize> = (0..n).collect();
    chunk(order, batch_size)
}

/// Batches over a random permutation of `0..n`.
pub fn shuffled_batch_indices<R: Rng + ?Sized>(
    n: usize,
    batch_size: usize,
    rng: &mut R,
) -> Result<Vec<Vec<usize>>> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    chunk(order, batch_size)
}

fn chunk(order: Vec<usize>, batch_size: usize) -> Result<Vec<Vec<usize>>> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig("batch_size must be positive".into()));
    }
    Ok(order.chunks(batch_size).map(<[usize]>::to_vec).collect())
}

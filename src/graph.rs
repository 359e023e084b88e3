//! Graph with named node and edge feature tensors.
//!
//! Feature tensors are addressed by name, following the DGL convention of
//! `ndata["feat"]`, `ndata["eig"]` and `edata["feat"]`. The adjacency is a
//! dense, symmetric-normalised matrix with self loops:
//!
//! ```text
//! A_hat = D^{-1/2} (A + I) D^{-1/2}
//! ```
//!
//! Dense storage keeps message passing a single `matmul`; it is intended for
//! graphs that fit `N x N` floats in device memory.

use std::collections::HashMap;

use candle_core::{Device, Tensor};

use crate::edges::EdgeList;
use crate::error::{Error, Result};

/// Name of the input node features and of the edge features.
pub const FEAT: &str = "feat";
/// Name of the Laplacian eigenvector node features.
pub const EIG: &str = "eig";

#[derive(Debug, Clone)]
pub struct Graph {
    num_nodes: usize,
    num_edges: usize,
    adjacency: Tensor,
    node_data: HashMap<String, Tensor>,
    edge_data: HashMap<String, Tensor>,
}

impl Graph {
    /// Build a graph over `num_nodes` nodes from an undirected edge list.
    pub fn from_edges(num_nodes: usize, edges: &EdgeList, device: &Device) -> Result<Self> {
        let adjacency = normalized_adjacency(num_nodes, edges, device)?;
        Ok(Self {
            num_nodes,
            num_edges: edges.len(),
            adjacency,
            node_data: HashMap::new(),
            edge_data: HashMap::new(),
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Normalised adjacency `(N, N)`.
    pub fn adjacency(&self) -> &Tensor {
        &self.adjacency
    }

    pub fn device(&self) -> &Device {
        self.adjacency.device()
    }

    /// Store node data; the first dimension must equal the node count.
    pub fn set_node_data(&mut self, name: &str, tensor: Tensor) -> Result<()> {
        check_rows(name, &tensor, self.num_nodes)?;
        self.node_data.insert(name.to_string(), tensor);
        Ok(())
    }

    /// Store edge data; the first dimension must equal the edge count.
    pub fn set_edge_data(&mut self, name: &str, tensor: Tensor) -> Result<()> {
        check_rows(name, &tensor, self.num_edges)?;
        self.edge_data.insert(name.to_string(), tensor);
        Ok(())
    }

    pub fn node_data(&self, name: &str) -> Option<&Tensor> {
        self.node_data.get(name)
    }

    pub fn edge_data(&self, name: &str) -> Option<&Tensor> {
        self.edge_data.get(name)
    }

    /// Node data that must be present.
    pub fn try_node_data(&self, name: &str) -> Result<&Tensor> {
        self.node_data
            .get(name)
            .ok_or_else(|| Error::MissingFeature(format!("ndata[{name:?}]")))
    }

    /// Copy of this graph with every tensor on `device`.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        let mut moved = self.clone();
        moved.move_to(device)?;
        Ok(moved)
    }

    /// Move every tensor to `device` in place.
    ///
    /// Each tensor is checked on its own; tensors already on `device` are kept.
    pub fn move_to(&mut self, device: &Device) -> Result<()> {
        self.adjacency = self.adjacency.to_device(device)?;
        for tensor in self.node_data.values_mut() {
            *tensor = tensor.to_device(device)?;
        }
        for tensor in self.edge_data.values_mut() {
            *tensor = tensor.to_device(device)?;
        }
        Ok(())
    }
}

fn check_rows(name: &str, tensor: &Tensor, expected: usize) -> Result<()> {
    let found = tensor.dims().first().copied().unwrap_or(0);
    if found != expected {
        return Err(Error::ShapeMismatch {
            name: name.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn normalized_adjacency(num_nodes: usize, edges: &EdgeList, device: &Device) -> Result<Tensor> {
    let n = num_nodes;
    let mut adj = vec![0f32; n * n];
    for i in 0..n {
        adj[i * n + i] = 1.0;
    }
    for &(s, d) in edges.iter() {
        let (s, d) = (s as usize, d as usize);
        if s >= n || d >= n {
            return Err(Error::NodeOutOfRange {
                index: s.max(d) as u32,
                num_nodes,
            });
        }
        adj[s * n + d] = 1.0;
        adj[d * n + s] = 1.0;
    }

    let inv_sqrt_deg: Vec<f32> = adj
        .chunks(n.max(1))
        .take(n)
        .map(|row| 1.0 / row.iter().sum::<f32>().sqrt())
        .collect();
    for i in 0..n {
        for j in 0..n {
            adj[i * n + j] *= inv_sqrt_deg[i] * inv_sqrt_deg[j];
        }
    }

    Ok(Tensor::from_vec(adj, (n, n), device)?)
}

//! Eigen-feature rotation augmentation.
//!
//! Laplacian eigenvectors are defined only up to sign and, for repeated
//! eigenvalues, up to rotation within the eigenspace. Rotating channels 1
//! and 2 by a small random angle per node during training pushes the model
//! toward invariance to that ambiguity:
//!
//! ```text
//! s = sin(a * pi / 180),  a ~ U(-m, m)
//! c = sqrt(1 - s^2)
//! eig1' = c * eig1 + s * eig2
//! eig2' = c * eig2 - s * eig1
//! ```
//!
//! The rotation is transient. [`EigenAugmentation::apply`] returns a guard
//! that restores the original tensor when dropped, so a perturbation never
//! survives past the batch that requested it.

use std::ops::Deref;

use candle_core::{Tensor, D};
use rand::Rng;

use crate::error::{Error, Result};
use crate::graph::{Graph, EIG};

/// Magnitudes at or below this leave the graph untouched.
pub const AUGMENTATION_EPSILON: f64 = 1e-7;

/// Random per-node rotation of eigen channels 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenAugmentation {
    /// Maximum rotation angle in degrees.
    pub magnitude: f64,
}

impl EigenAugmentation {
    pub fn new(magnitude: f64) -> Self {
        Self { magnitude }
    }

    pub fn is_active(&self) -> bool {
        self.magnitude > AUGMENTATION_EPSILON
    }

    /// Perturb `graph`'s eigen features until the returned guard is dropped.
    ///
    /// Inactive augmentation draws nothing from `rng`.
    pub fn apply<'g, R: Rng + ?Sized>(
        &self,
        graph: &'g mut Graph,
        rng: &mut R,
    ) -> Result<AugmentedGraph<'g>> {
        if !self.is_active() {
            return Ok(AugmentedGraph {
                graph,
                original: None,
            });
        }

        let original = graph.try_node_data(EIG)?.clone();
        let rotated = self.rotate(&original, rng)?;
        graph.set_node_data(EIG, rotated)?;
        Ok(AugmentedGraph {
            graph,
            original: Some(original),
        })
    }

    fn rotate<R: Rng + ?Sized>(&self, eig: &Tensor, rng: &mut R) -> Result<Tensor> {
        let (n, channels) = eig.dims2()?;
        if channels < 3 {
            return Err(Error::EigenChannels { found: channels });
        }

        let sines: Vec<f32> = (0..n)
            .map(|_| {
                let angle = (rng.gen::<f64>() - 0.5) * 2.0 * self.magnitude;
                angle.to_radians().sin() as f32
            })
            .collect();
        let sine = Tensor::from_vec(sines, (n, 1), eig.device())?.to_dtype(eig.dtype())?;
        let cosine = sine.sqr()?.affine(-1.0, 1.0)?.sqrt()?;

        let eig1 = eig.narrow(D::Minus1, 1, 1)?;
        let eig2 = eig.narrow(D::Minus1, 2, 1)?;
        let rot1 = ((&cosine * &eig1)? + (&sine * &eig2)?)?;
        let rot2 = ((&cosine * &eig2)? - (&sine * &eig1)?)?;

        let mut parts = vec![eig.narrow(D::Minus1, 0, 1)?, rot1, rot2];
        if channels > 3 {
            parts.push(eig.narrow(D::Minus1, 3, channels - 3)?);
        }
        Ok(Tensor::cat(&parts, D::Minus1)?)
    }
}

/// Graph borrowed with (possibly) perturbed eigen features.
///
/// Dropping the guard puts the original eigen tensor back.
pub struct AugmentedGraph<'g> {
    graph: &'g mut Graph,
    original: Option<Tensor>,
}

impl AugmentedGraph<'_> {
    pub fn is_perturbed(&self) -> bool {
        self.original.is_some()
    }
}

impl Deref for AugmentedGraph<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &*self.graph
    }
}

impl Drop for AugmentedGraph<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            // Same row count as when it was taken out, so this cannot fail.
            let _ = self.graph.set_node_data(EIG, original);
        }
    }
}

//! Negative edge sampling.
//!
//! Negatives are drawn uniformly over node pairs without checking them
//! against the observed edges, so a sampled "negative" can be a true edge.
//! On sparse graphs the collision rate is roughly `|E| / N^2`.

use rand::Rng;

use crate::edges::EdgeList;
use crate::error::{Error, Result};

/// Draw `count` node pairs with both endpoints uniform in `[0, num_nodes)`.
pub fn uniform_negatives<R: Rng + ?Sized>(
    num_nodes: usize,
    count: usize,
    rng: &mut R,
) -> Result<EdgeList> {
    if count == 0 {
        return Ok(EdgeList::default());
    }
    if num_nodes == 0 {
        return Err(Error::EmptyGraph);
    }
    let upper = u32::try_from(num_nodes)
        .map_err(|_| Error::InvalidConfig(format!("{num_nodes} nodes exceed u32 indices")))?;

    Ok((0..count)
        .map(|_| (rng.gen_range(0..upper), rng.gen_range(0..upper)))
        .collect())
}

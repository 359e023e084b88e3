use thiserror::Error;

/// Errors that can occur in lattix-linkpred.
#[derive(Error, Debug)]
pub enum Error {
    /// Tensor or autodiff failure reported by candle.
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An edge list that must be non-empty was empty.
    #[error("Edge set is empty: {0}")]
    EmptyEdgeSet(&'static str),
    /// An evaluator received no positive scores.
    #[error("No positive scores to evaluate")]
    EmptyScores,
    /// Sampling was requested from a graph without nodes.
    #[error("Graph has no nodes")]
    EmptyGraph,
    /// Named node or edge data is not stored on the graph.
    #[error("Missing feature: {0}")]
    MissingFeature(String),
    /// Eigen features need at least three channels to be rotated.
    #[error("Eigen features have {found} channels, need at least 3")]
    EigenChannels {
        /// Number of channels present.
        found: usize,
    },
    /// Tensor shape does not match the graph.
    #[error("Shape mismatch for {name}: expected {expected} rows, got {found}")]
    ShapeMismatch {
        /// Feature name.
        name: String,
        /// Expected number of rows.
        expected: usize,
        /// Actual number of rows.
        found: usize,
    },
    /// Edge endpoint outside `[0, num_nodes)`.
    #[error("Node index {index} out of range for graph with {num_nodes} nodes")]
    NodeOutOfRange {
        /// Offending index.
        index: u32,
        /// Number of nodes in the graph.
        num_nodes: usize,
    },
    /// Evaluator output did not contain the requested metric.
    #[error("Metric not reported by evaluator: {0}")]
    MissingMetric(String),
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for lattix-linkpred.
pub type Result<T> = std::result::Result<T, Error>;

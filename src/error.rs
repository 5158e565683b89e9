//! Errors raised at the public boundary of the gate engines

use thiserror::Error;

use crate::qubit::BitInteger;

/// Precondition violations detected before any amplitude is touched
#[derive(Error, Debug)]
pub enum GateError {
    /// The state (or staging buffer) has no elements
    #[error("state vector is empty")]
    EmptyState,

    /// Length is not 2^n
    #[error("state length {len} is not a power of two")]
    NotPowerOfTwo { len: usize },

    /// Operated qubit does not address the state
    #[error("qubit {qubit} out of range for {num_qubits}-qubit state")]
    QubitOutOfRange { qubit: BitInteger, num_qubits: BitInteger },

    /// The same position was passed twice to one call
    #[error("qubit {qubit} is operated more than once")]
    DuplicateQubit { qubit: BitInteger },

    /// The staging buffer must be strictly smaller than the state
    #[error("staging buffer of {num_on_cache_qubits} qubits does not fit below a {num_qubits}-qubit state")]
    StagingTooLarge {
        num_on_cache_qubits: BitInteger,
        num_qubits: BitInteger,
    },

    /// Chunk selection needs one on-cache position per operated qubit
    #[error("{num_operated_qubits} operated qubits exceed {num_on_cache_qubits} on-cache qubits")]
    TooManyOperatedQubits {
        num_operated_qubits: usize,
        num_on_cache_qubits: BitInteger,
    },

    /// Direct tiling was requested for a qubit above the on-cache range
    #[error("qubit {qubit} is off-cache for {num_on_cache_qubits} on-cache qubits")]
    NotAllOnCache {
        qubit: BitInteger,
        num_on_cache_qubits: BitInteger,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for gate application
pub type Result<T> = std::result::Result<T, GateError>;

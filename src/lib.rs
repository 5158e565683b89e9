pub mod config; // for engine and cache configuration
pub mod error; // for gate errors
pub mod gate; // for gate application engines and dispatch
pub mod index; // for index tuple expansion
pub mod mask; // for qubit and index masks
pub mod policy; // for parallel loop policies
pub mod qubit; // for qubit positions and validation

pub use config::{CacheConfig, EngineConfig, DEFAULT_NUM_ON_CACHE_QUBITS};
pub use error::{GateError, Result};
pub use gate::{gate, gate_with, gate_with_config, Amplitudes, GateExt};
pub use policy::{ParallelPolicy, PolicyKind, Rayon, Scoped, Sequential};
pub use qubit::{BitInteger, Control, OperatedQubit, Qubit, StateInteger};

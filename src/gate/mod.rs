//! Gate application: picks the no-cache, in-place tiled, or staged engine for a call.

pub mod amplitudes;
pub mod cache;
pub mod nocache;
pub(crate) mod scratch;

use log::{debug, warn};

pub use self::amplitudes::Amplitudes;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::policy::{ParallelPolicy, Sequential};
use crate::qubit::{all_in_state_vector, integer_exp2, num_qubits_of, validate_qubits, RemoveControl};

/// Applies `transform` to every index tuple of `state` for the operated `qubits`,
/// routing through the staging engines when `state` is larger than the on-cache size.
pub fn gate_with_config<P, T, F, Q>(policy: &P, config: &CacheConfig, state: &mut [T], transform: F, qubits: &[Q]) -> Result<()>
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
    Q: RemoveControl,
{
    let num_qubits = num_qubits_of(state.len())?;
    validate_qubits(num_qubits, qubits)?;
    let num_on_cache_qubits = config.num_on_cache_qubits;

    if !cfg!(feature = "cache-aware") || !config.enabled || num_qubits <= num_on_cache_qubits {
        debug!("gate: no-cache engine, {} qubits, {} operated", num_qubits, qubits.len());
        return nocache::gate(policy, state, transform, qubits);
    }

    if all_in_state_vector(num_on_cache_qubits, qubits) {
        debug!("gate: all operated qubits below {}, tiling in place", num_on_cache_qubits);
        return cache::all_on_cache::gate(policy, state, num_on_cache_qubits, transform, qubits);
    }

    if qubits.len() > num_on_cache_qubits as usize {
        warn!(
            "gate: {} operated qubits do not fit {} on-cache qubits, using the no-cache engine",
            qubits.len(),
            num_on_cache_qubits
        );
        return nocache::gate(policy, state, transform, qubits);
    }

    // owned by this call only
    let mut staging = vec![state[0]; integer_exp2(num_on_cache_qubits)];
    cache::gate(policy, state, &mut staging, transform, qubits)
}

/// [`gate_with_config`] with the default [`CacheConfig`]
pub fn gate_with<P, T, F, Q>(policy: &P, state: &mut [T], transform: F, qubits: &[Q]) -> Result<()>
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
    Q: RemoveControl,
{
    gate_with_config(policy, &CacheConfig::default(), state, transform, qubits)
}

/// [`gate_with`] on the calling thread
pub fn gate<T, F, Q>(state: &mut [T], transform: F, qubits: &[Q]) -> Result<()>
where
    T: Copy + Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
    Q: RemoveControl,
{
    gate_with(&Sequential, state, transform, qubits)
}

/// Gate application as a method on state slices
pub trait GateExt<T> {
    fn apply_gate<F, Q>(&mut self, transform: F, qubits: &[Q]) -> Result<&mut Self>
    where
        F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
        Q: RemoveControl;

    fn apply_gate_with<P, F, Q>(&mut self, policy: &P, transform: F, qubits: &[Q]) -> Result<&mut Self>
    where
        P: ParallelPolicy + ?Sized,
        F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
        Q: RemoveControl;
}

impl<T: Copy + Send + Sync> GateExt<T> for [T] {
    fn apply_gate<F, Q>(&mut self, transform: F, qubits: &[Q]) -> Result<&mut Self>
    where
        F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
        Q: RemoveControl,
    {
        gate(self, transform, qubits)?;
        Ok(self)
    }

    fn apply_gate_with<P, F, Q>(&mut self, policy: &P, transform: F, qubits: &[Q]) -> Result<&mut Self>
    where
        P: ParallelPolicy + ?Sized,
        F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
        Q: RemoveControl,
    {
        gate_with(policy, self, transform, qubits)?;
        Ok(self)
    }
}

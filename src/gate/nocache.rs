//! No-cache engine: one parallel loop over every compacted index of the whole buffer.

use crate::error::Result;
use crate::gate::amplitudes::{Amplitudes, SharedSlice};
use crate::gate::scratch::ScratchArena;
use crate::index::make_indices_into;
use crate::mask::{make_index_masks, make_qubit_masks};
use crate::policy::ParallelPolicy;
use crate::qubit::{num_qubits_of, validate_qubits, RemoveControl, StateInteger};

/// Applies `transform` to every index tuple of `state` for the operated `qubits`.
///
/// The loop runs over `[0, len >> N)`; iterations are unordered and may run on any of
/// `policy.num_threads()` threads. `transform` receives the tuple and the thread index.
pub fn gate<P, T, F, Q>(policy: &P, state: &mut [T], transform: F, qubits: &[Q]) -> Result<()>
where
    P: ParallelPolicy + ?Sized,
    T: Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
    Q: RemoveControl,
{
    let num_qubits = num_qubits_of(state.len())?;
    validate_qubits(num_qubits, qubits)?;

    let qubit_masks = make_qubit_masks(qubits);
    let index_masks = make_index_masks(qubits);
    let scratch = ScratchArena::new(policy.num_threads(), 1 << qubits.len());
    apply(policy, &scratch, state, &transform, &qubit_masks, &index_masks);
    Ok(())
}

/// Unchecked inner engine, shared with the tiled and staged engines.
/// `data.len()` must be a power of two covering every qubit mask.
pub(crate) fn apply<P, T, F>(
    policy: &P,
    scratch: &ScratchArena,
    data: &mut [T],
    transform: &F,
    qubit_masks: &[StateInteger],
    index_masks: &[StateInteger],
) where
    P: ParallelPolicy + ?Sized,
    T: Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
{
    debug_assert!(data.len().is_power_of_two());
    debug_assert!(qubit_masks.iter().all(|&mask| mask < data.len()));

    let count = data.len() >> qubit_masks.len();
    let data = SharedSlice::new(data);
    policy.for_each_block(count, &|range, thread_index| {
        scratch.with_slot(thread_index, |indices| {
            for index_wo_qubits in range {
                make_indices_into(index_wo_qubits, qubit_masks, index_masks, indices);
                // tuples of distinct compacted indices are disjoint
                let mut amplitudes = unsafe { data.amplitudes(indices) };
                transform(&mut amplitudes, thread_index);
            }
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::policy::{Rayon, Scoped, Sequential};
    use crate::qubit::{Control, OperatedQubit, Qubit};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hadamard_like(amplitudes: &mut Amplitudes<'_, f64>, _: usize) {
        let (a, b) = (amplitudes[0], amplitudes[1]);
        amplitudes[0] = a + b;
        amplitudes[1] = a - b;
    }

    #[test]
    fn test_single_qubit_pairs() {
        let mut state: Vec<f64> = (0..8).map(|i| i as f64).collect();
        gate(&Sequential, &mut state, hadamard_like, &[Qubit(1)]).unwrap();
        // pairs (0,2), (1,3), (4,6), (5,7)
        assert_eq!(state, vec![2.0, 4.0, -2.0, -2.0, 10.0, 12.0, -2.0, -2.0]);
    }

    #[test]
    fn test_every_element_seen_once_without_qubits() {
        let mut state = vec![1u32; 16];
        let calls = AtomicUsize::new(0);
        gate(
            &Sequential,
            &mut state,
            |amplitudes: &mut Amplitudes<'_, u32>, _| {
                assert_eq!(amplitudes.len(), 1);
                amplitudes[0] += 1;
                calls.fetch_add(1, Ordering::Relaxed);
            },
            &[] as &[Qubit],
        )
        .unwrap();
        assert_eq!(calls.into_inner(), 16);
        assert!(state.iter().all(|&value| value == 2));
    }

    #[test]
    fn test_policies_agree() {
        let qubits = [Qubit(4), Qubit(0), Qubit(2)];
        let initial: Vec<f64> = (0..64).map(|i| (i * 7 % 13) as f64).collect();

        fn transform(amplitudes: &mut Amplitudes<'_, f64>, _: usize) {
            let values: Vec<f64> = amplitudes.iter().copied().collect();
            for n in 0..values.len() {
                amplitudes[n] = values[(n + 1) % values.len()] * (n as f64 + 1.0);
            }
        }

        let mut expected = initial.clone();
        gate(&Sequential, &mut expected, transform, &qubits).unwrap();

        let mut rayon = initial.clone();
        gate(&Rayon::with_threads(4).unwrap(), &mut rayon, transform, &qubits).unwrap();
        assert_eq!(rayon, expected);

        let mut scoped = initial.clone();
        gate(&Scoped::new(3).unwrap(), &mut scoped, transform, &qubits).unwrap();
        assert_eq!(scoped, expected);
    }

    #[test]
    fn test_thread_index_in_range() {
        let policy = Scoped::new(4).unwrap();
        let mut state = vec![0usize; 256];
        gate(
            &policy,
            &mut state,
            |amplitudes: &mut Amplitudes<'_, usize>, thread_index| {
                assert!(thread_index < 4);
                amplitudes[0] = thread_index + 1;
                amplitudes[1] = thread_index + 1;
            },
            &[Qubit(7)],
        )
        .unwrap();
        assert!(state.iter().all(|&owner| owner >= 1 && owner <= 4));
    }

    #[test]
    fn test_controls_are_operated_positions() {
        // controlled-not on (control 0, target 1) as a swap of patterns 0b01 and 0b11
        let mut state: Vec<u8> = (0..4).collect();
        let qubits = [OperatedQubit::from(Control::new(Qubit(0))), OperatedQubit::from(Qubit(1))];
        gate(&Sequential, &mut state, |amplitudes: &mut Amplitudes<'_, u8>, _| amplitudes.swap(0b01, 0b11), &qubits).unwrap();
        assert_eq!(state, vec![0, 3, 2, 1]);
    }

    #[test]
    fn test_rejects_bad_input() {
        fn noop(_: &mut Amplitudes<'_, f64>, _: usize) {}
        assert!(matches!(gate(&Sequential, &mut [0.0; 6], noop, &[Qubit(0)]), Err(GateError::NotPowerOfTwo { len: 6 })));
        assert!(matches!(gate(&Sequential, &mut [] as &mut [f64], noop, &[Qubit(0)]), Err(GateError::EmptyState)));
        assert!(matches!(
            gate(&Sequential, &mut [0.0; 8], noop, &[Qubit(3)]),
            Err(GateError::QubitOutOfRange { qubit: 3, num_qubits: 3 })
        ));
        assert!(matches!(
            gate(&Sequential, &mut [0.0; 8], noop, &[Qubit(1), Qubit(1)]),
            Err(GateError::DuplicateQubit { qubit: 1 })
        ));
    }
}

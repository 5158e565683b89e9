// index expansion: one compacted index -> the 2^N flat offsets of its tuple

use crate::qubit::StateInteger;

/// Re-inserts a zero bit at every operated position of `index_wo_qubits`
#[inline]
pub fn base_index(index_wo_qubits: StateInteger, index_masks: &[StateInteger]) -> StateInteger {
    // xx0xx0xx0xx
    index_masks
        .iter()
        .enumerate()
        .fold(0, |base, (shift, mask)| base | ((index_wo_qubits & mask) << shift))
}

/// Fills `result` (length 2^N) with the flat offsets for every assignment of the N operated bits.
/// Bit b of the tuple position selects `qubit_masks[b]`.
#[inline]
pub fn make_indices_into(
    index_wo_qubits: StateInteger,
    qubit_masks: &[StateInteger],
    index_masks: &[StateInteger],
    result: &mut [StateInteger],
) {
    debug_assert_eq!(index_masks.len(), qubit_masks.len() + 1);
    debug_assert_eq!(result.len(), 1 << qubit_masks.len());

    match qubit_masks {
        [] => result[0] = index_wo_qubits,
        [qubit_mask] => {
            result[0] = ((index_wo_qubits & index_masks[1]) << 1) | (index_wo_qubits & index_masks[0]);
            result[1] = result[0] | qubit_mask;
        }
        _ => {
            let base = base_index(index_wo_qubits, index_masks);
            result[0] = base;
            for n in 1..result.len() {
                result[n] = base;
                for (qubit_index, qubit_mask) in qubit_masks.iter().enumerate() {
                    if (n >> qubit_index) & 1 != 0 {
                        result[n] |= qubit_mask;
                    }
                }
            }
        }
    }
}

/// Allocating form of [`make_indices_into`]
pub fn make_indices(
    index_wo_qubits: StateInteger,
    qubit_masks: &[StateInteger],
    index_masks: &[StateInteger],
) -> Vec<StateInteger> {
    let mut result = vec![0; 1 << qubit_masks.len()];
    make_indices_into(index_wo_qubits, qubit_masks, index_masks, &mut result);
    result
}

/// Flat offset for a single assignment `qubits_value` of the operated bits
#[inline]
pub fn index_with_qubits(
    index_wo_qubits: StateInteger,
    qubits_value: StateInteger,
    qubit_masks: &[StateInteger],
    index_masks: &[StateInteger],
) -> StateInteger {
    debug_assert!(qubits_value < (1 << qubit_masks.len()));

    qubit_masks
        .iter()
        .enumerate()
        .filter(|(qubit_index, _)| (qubits_value >> qubit_index) & 1 != 0)
        .fold(base_index(index_wo_qubits, index_masks), |index, (_, qubit_mask)| index | qubit_mask)
}

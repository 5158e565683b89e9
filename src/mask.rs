// qubit masks and index masks
//
//   qubits {1, 3, 5} in a 7-bit index:
//     qubit masks: 0000010, 0001000, 0100000          (caller order)
//     index masks: 0000001, 0000010, 0000100, ...1111000   (over the compacted index)
//   index mask j covers the free bits that move up by j when the operated bits are re-inserted

use crate::qubit::{BitInteger, Qubit, RemoveControl, StateInteger};

/// One single-bit mask per operated qubit, in the order the qubits were supplied
pub fn make_qubit_masks<Q: RemoveControl>(qubits: &[Q]) -> Vec<StateInteger> {
    qubits.iter().map(|qubit| qubit.remove_control().mask()).collect()
}

/// N+1 disjoint masks over the compacted index (N operated bits removed)
pub fn make_index_masks<Q: RemoveControl>(qubits: &[Q]) -> Vec<StateInteger> {
    match qubits {
        [] => vec![!0],
        [qubit] => {
            let lower = qubit.remove_control().mask() - 1;
            vec![lower, !lower]
        }
        [qubit1, qubit2] => {
            let (low, high) = {
                let a = qubit1.remove_control();
                let b = qubit2.remove_control();
                if a < b { (a, b) } else { (b, a) }
            };
            let first = low.mask() - 1;
            let second = ((Qubit(high.0 - 1).mask()) - 1) ^ first;
            vec![first, second, !(first | second)]
        }
        _ => {
            let mut sorted_qubits: Vec<Qubit> = qubits.iter().map(|qubit| qubit.remove_control()).collect();
            sorted_qubits.sort_unstable();
            unsafe_sorted::make_index_masks(&sorted_qubits)
        }
    }
}

/// Mask builders that trust the caller to have sorted the qubits already
pub mod unsafe_sorted {
    use super::*;

    /// `sorted_qubits` must be ascending and non-empty (checked in debug builds only)
    pub fn make_index_masks(sorted_qubits: &[Qubit]) -> Vec<StateInteger> {
        debug_assert!(!sorted_qubits.is_empty());
        debug_assert!(sorted_qubits.windows(2).all(|pair| pair[0] < pair[1]));

        let mut result = Vec::with_capacity(sorted_qubits.len() + 1);
        let mut previous_partial_sums: StateInteger = 0;
        for (index, qubit) in sorted_qubits.iter().enumerate() {
            let partial_sums = Qubit(qubit.0 - index as BitInteger).mask() - 1;
            result.push(partial_sums ^ previous_partial_sums);
            previous_partial_sums = partial_sums;
        }
        result.push(!previous_partial_sums);
        result
    }
}

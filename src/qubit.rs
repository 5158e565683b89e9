// qubit positions, control wrappers, and the checks every entry point runs once

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GateError, Result};

/// Flat offset into a state vector
pub type StateInteger = usize;

/// Bit position inside a flat offset
pub type BitInteger = u32;

/// A bit position in the state vector's address space
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Qubit(pub BitInteger);

impl Qubit {
    pub const fn new(position: BitInteger) -> Self {
        Qubit(position)
    }

    pub const fn position(self) -> BitInteger {
        self.0
    }

    /// Single-bit mask at this position
    pub const fn mask(self) -> StateInteger {
        (1 as StateInteger) << self.0
    }
}

impl From<BitInteger> for Qubit {
    fn from(position: BitInteger) -> Self {
        Qubit(position)
    }
}

impl fmt::Display for Qubit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// A control qubit. Only restricts a gate's support, so masks treat it as a plain qubit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Control<Q = Qubit>(pub Q);

impl Control<Qubit> {
    pub const fn new(qubit: Qubit) -> Self {
        Control(qubit)
    }

    pub const fn qubit(self) -> Qubit {
        self.0
    }
}

/// Target or control qubit, for calls that mix both in one slice
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatedQubit {
    Target(Qubit),
    Control(Qubit),
}

impl From<Qubit> for OperatedQubit {
    fn from(qubit: Qubit) -> Self {
        OperatedQubit::Target(qubit)
    }
}

impl From<Control<Qubit>> for OperatedQubit {
    fn from(control: Control<Qubit>) -> Self {
        OperatedQubit::Control(control.0)
    }
}

/// Strips control-ness, leaving the bare position
pub trait RemoveControl: Copy {
    fn remove_control(self) -> Qubit;
}

impl RemoveControl for Qubit {
    #[inline]
    fn remove_control(self) -> Qubit {
        self
    }
}

impl RemoveControl for Control<Qubit> {
    #[inline]
    fn remove_control(self) -> Qubit {
        self.0
    }
}

impl RemoveControl for OperatedQubit {
    #[inline]
    fn remove_control(self) -> Qubit {
        match self {
            OperatedQubit::Target(qubit) | OperatedQubit::Control(qubit) => qubit,
        }
    }
}

impl RemoveControl for BitInteger {
    #[inline]
    fn remove_control(self) -> Qubit {
        Qubit(self)
    }
}

/// 2^exponent
#[inline]
pub const fn integer_exp2(exponent: BitInteger) -> StateInteger {
    (1 as StateInteger) << exponent
}

/// floor(log2(value)), value > 0
#[inline]
pub const fn integer_log2(value: StateInteger) -> BitInteger {
    StateInteger::BITS - 1 - value.leading_zeros()
}

/// Number of qubits addressed by a vector of `len` elements
pub fn num_qubits_of(len: usize) -> Result<BitInteger> {
    if len == 0 {
        return Err(GateError::EmptyState);
    }
    if !len.is_power_of_two() {
        return Err(GateError::NotPowerOfTwo { len });
    }
    Ok(integer_log2(len))
}

/// Operated qubits must be distinct and inside `[0, num_qubits)`
pub fn validate_qubits<Q: RemoveControl>(num_qubits: BitInteger, qubits: &[Q]) -> Result<()> {
    let mut seen: StateInteger = 0;
    for qubit in qubits.iter().map(|qubit| qubit.remove_control()) {
        if qubit.0 >= num_qubits {
            return Err(GateError::QubitOutOfRange {
                qubit: qubit.0,
                num_qubits,
            });
        }
        if seen & qubit.mask() != 0 {
            return Err(GateError::DuplicateQubit { qubit: qubit.0 });
        }
        seen |= qubit.mask();
    }
    Ok(())
}

/// True if every qubit lies below `num_qubits`
pub fn all_in_state_vector<Q: RemoveControl>(num_qubits: BitInteger, qubits: &[Q]) -> bool {
    qubits.iter().all(|qubit| qubit.remove_control().0 < num_qubits)
}

/// True if no qubit lies below `num_qubits`
pub fn none_in_state_vector<Q: RemoveControl>(num_qubits: BitInteger, qubits: &[Q]) -> bool {
    qubits.iter().all(|qubit| qubit.remove_control().0 >= num_qubits)
}

/// Control-stripped positions, in caller order
pub fn raw_qubits<Q: RemoveControl>(qubits: &[Q]) -> Vec<Qubit> {
    qubits.iter().map(|qubit| qubit.remove_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_is_stripped() {
        let mixed = [OperatedQubit::from(Qubit(3)), OperatedQubit::from(Control::new(Qubit(1)))];
        assert_eq!(raw_qubits(&mixed), vec![Qubit(3), Qubit(1)]);
    }

    #[test]
    fn test_num_qubits_of() {
        assert_eq!(num_qubits_of(1).unwrap(), 0);
        assert_eq!(num_qubits_of(64).unwrap(), 6);
        assert!(matches!(num_qubits_of(0), Err(GateError::EmptyState)));
        assert!(matches!(num_qubits_of(48), Err(GateError::NotPowerOfTwo { len: 48 })));
    }

    #[test]
    fn test_validate_qubits() {
        assert!(validate_qubits(4, &[Qubit(0), Qubit(3)]).is_ok());
        assert!(matches!(
            validate_qubits(4, &[Qubit(4)]),
            Err(GateError::QubitOutOfRange { qubit: 4, num_qubits: 4 })
        ));
        assert!(matches!(
            validate_qubits(
                4,
                &[OperatedQubit::from(Qubit(2)), OperatedQubit::from(Control::new(Qubit(2)))]
            ),
            Err(GateError::DuplicateQubit { qubit: 2 })
        ));
    }

    #[test]
    fn test_cache_range_predicates() {
        let qubits = [Qubit(1), Qubit(5)];
        assert!(all_in_state_vector(6, &qubits));
        assert!(!all_in_state_vector(5, &qubits));
        assert!(none_in_state_vector(6, &[Qubit(6), Qubit(7)]));
        assert!(!none_in_state_vector(5, &qubits));
    }
}

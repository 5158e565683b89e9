//! The transform's view of one index tuple.
//!
//! Engines run tuples concurrently against one buffer. Tuples are disjoint, so each
//! transform call gets an [`Amplitudes`] that can reach exactly the 2^N offsets of its
//! own tuple and nothing else.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};

use crate::qubit::StateInteger;

/// Raw handle to a slice written from several threads at disjoint offsets
pub(crate) struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<T> Clone for SharedSlice<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedSlice<'_, T> {}

// disjointness of concurrent accesses is upheld by the engines
unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send + Sync> Sync for SharedSlice<'_, T> {}

impl<'a, T> SharedSlice<'a, T> {
    pub(crate) fn new(slice: &'a mut [T]) -> Self {
        SharedSlice {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// # Safety
    /// No other live reference may overlap `range` while the result is alive.
    pub(crate) unsafe fn slice_mut(&self, range: Range<usize>) -> &'a mut [T] {
        debug_assert!(range.start <= range.end && range.end <= self.len);
        std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.end - range.start)
    }

    /// # Safety
    /// Every offset in `indices` must be in bounds, and no other live reference may
    /// touch any of them while the result is alive.
    pub(crate) unsafe fn amplitudes<'t>(&self, indices: &'t [StateInteger]) -> Amplitudes<'t, T>
    where
        'a: 't,
    {
        debug_assert!(indices.iter().all(|&index| index < self.len));
        Amplitudes {
            data: self.ptr,
            indices,
            _marker: PhantomData,
        }
    }
}

/// Amplitudes of one index tuple, addressed by the bit pattern `n` of the operated qubits
/// (bit `b` of `n` is the value of the `b`-th operated qubit in call order)
pub struct Amplitudes<'a, T> {
    data: *mut T,
    indices: &'a [StateInteger],
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Amplitudes<'a, T> {
    /// 2^N
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Flat offsets of this tuple, relative to the buffer the engine is running on.
    /// Under staging these are offsets into the on-cache buffer, not the state.
    pub fn indices(&self) -> &[StateInteger] {
        self.indices
    }

    pub fn get(&self, n: usize) -> Option<&T> {
        self.indices.get(n).map(|&index| unsafe { &*self.data.add(index) })
    }

    pub fn get_mut(&mut self, n: usize) -> Option<&mut T> {
        self.indices.get(n).map(|&index| unsafe { &mut *self.data.add(index) })
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        let (a, b) = (self.indices[a], self.indices[b]);
        unsafe { std::ptr::swap(self.data.add(a), self.data.add(b)) }
    }

    /// Values in bit-pattern order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.indices.iter().map(move |&index| unsafe { &*self.data.add(index) })
    }

    /// Overwrites the tuple from `values`, in bit-pattern order
    pub fn assign(&mut self, values: &[T])
    where
        T: Copy,
    {
        assert_eq!(values.len(), self.indices.len());
        for (&index, &value) in self.indices.iter().zip(values) {
            unsafe { *self.data.add(index) = value }
        }
    }
}

impl<T> Index<usize> for Amplitudes<'_, T> {
    type Output = T;

    fn index(&self, n: usize) -> &T {
        let index = self.indices[n];
        unsafe { &*self.data.add(index) }
    }
}

impl<T> IndexMut<usize> for Amplitudes<'_, T> {
    fn index_mut(&mut self, n: usize) -> &mut T {
        let index = self.indices[n];
        unsafe { &mut *self.data.add(index) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplitudes_reach_only_their_tuple() {
        let mut data: Vec<i32> = (0..8).collect();
        let shared = SharedSlice::new(&mut data);
        let indices = [1, 5];
        let mut amplitudes = unsafe { shared.amplitudes(&indices) };

        assert_eq!(amplitudes.len(), 2);
        assert_eq!(amplitudes[0], 1);
        assert_eq!(amplitudes[1], 5);
        assert!(amplitudes.get(2).is_none());

        amplitudes.swap(0, 1);
        amplitudes[0] += 100;
        assert_eq!(amplitudes.iter().copied().collect::<Vec<_>>(), vec![105, 1]);

        assert_eq!(data, vec![0, 105, 2, 3, 4, 1, 6, 7]);
    }

    #[test]
    fn test_assign_in_bit_pattern_order() {
        let mut data = vec![0.0f64; 4];
        let shared = SharedSlice::new(&mut data);
        let indices = [3, 0];
        let mut amplitudes = unsafe { shared.amplitudes(&indices) };
        amplitudes.assign(&[1.5, -2.0]);
        assert_eq!(data, vec![-2.0, 0.0, 0.0, 1.5]);
    }

    #[test]
    fn test_disjoint_slices() {
        let mut data = vec![0u8; 6];
        let shared = SharedSlice::new(&mut data);
        let (left, right) = unsafe { (shared.slice_mut(0..3), shared.slice_mut(3..6)) };
        left.fill(1);
        right.fill(2);
        assert_eq!(shared.len(), 6);
        assert_eq!(data, vec![1, 1, 1, 2, 2, 2]);
    }
}

// one reusable index-tuple buffer per thread slot, allocated once per gate call

use parking_lot::Mutex;

use crate::qubit::StateInteger;

pub(crate) struct ScratchArena {
    slots: Vec<Mutex<Vec<StateInteger>>>,
}

impl ScratchArena {
    /// `num_threads` slots of `tuple_len` offsets each
    pub(crate) fn new(num_threads: usize, tuple_len: usize) -> Self {
        ScratchArena {
            slots: (0..num_threads.max(1)).map(|_| Mutex::new(vec![0; tuple_len])).collect(),
        }
    }

    /// Runs `f` on the buffer owned by `thread_index`.
    /// A slot is only locked by the block that owns it, so this never waits.
    pub(crate) fn with_slot<R>(&self, thread_index: usize, f: impl FnOnce(&mut [StateInteger]) -> R) -> R {
        debug_assert!(thread_index < self.slots.len());
        let mut slot = self.slots[thread_index].lock();
        f(&mut slot)
    }
}

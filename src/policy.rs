//! Parallel-loop policies.
//!
//! Every policy splits `[0, count)` into at most `num_threads` contiguous blocks and hands
//! each block its block number as `thread_index`. A block is run by exactly one thread, so
//! anything indexed by `thread_index` (the engines' scratch tuples) is never shared.

use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::gate::amplitudes::SharedSlice;
use crate::qubit::StateInteger;

/// Capability the engines are written against
pub trait ParallelPolicy: Sync {
    /// Upper bound (exclusive) of every `thread_index` this policy hands out
    fn num_threads(&self) -> usize;

    /// Calls `body(range, thread_index)` once per block of `[0, count)`
    fn for_each_block(&self, count: StateInteger, body: &(dyn Fn(Range<StateInteger>, usize) + Sync));

    /// Calls `body(index, thread_index)` for every index in `[0, count)`, unordered
    fn loop_n(&self, count: StateInteger, body: &(dyn Fn(StateInteger, usize) + Sync)) {
        self.for_each_block(count, &|range, thread_index| {
            for index in range {
                body(index, thread_index);
            }
        });
    }
}

impl<P: ParallelPolicy + ?Sized> ParallelPolicy for &P {
    fn num_threads(&self) -> usize {
        (**self).num_threads()
    }

    fn for_each_block(&self, count: StateInteger, body: &(dyn Fn(Range<StateInteger>, usize) + Sync)) {
        (**self).for_each_block(count, body)
    }
}

impl<P: ParallelPolicy + ?Sized> ParallelPolicy for Box<P> {
    fn num_threads(&self) -> usize {
        (**self).num_threads()
    }

    fn for_each_block(&self, count: StateInteger, body: &(dyn Fn(Range<StateInteger>, usize) + Sync)) {
        (**self).for_each_block(count, body)
    }
}

/// Block `block` of `num_blocks` near-equal contiguous blocks of `[0, count)`.
/// The first `count % num_blocks` blocks take one extra element.
pub fn block_range(count: StateInteger, num_blocks: usize, block: usize) -> Range<StateInteger> {
    debug_assert!(num_blocks > 0 && block < num_blocks);

    let base = count / num_blocks;
    let remainder = count % num_blocks;
    let extra = if block < remainder { 1 } else { 0 };
    let start = block * base + std::cmp::min(block, remainder);
    start..start + base + extra
}

// never more blocks than elements, never zero blocks for a non-empty range
fn num_blocks(count: StateInteger, num_threads: usize) -> usize {
    std::cmp::min(count, num_threads.max(1))
}

/// Plain loop on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ParallelPolicy for Sequential {
    fn num_threads(&self) -> usize {
        1
    }

    fn for_each_block(&self, count: StateInteger, body: &(dyn Fn(Range<StateInteger>, usize) + Sync)) {
        if count > 0 {
            body(0..count, 0);
        }
    }
}

/// One rayon task per block, on the global pool or a dedicated one
#[derive(Clone)]
pub struct Rayon {
    num_threads: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Rayon {
    /// Blocks sized for the global rayon pool
    pub fn new() -> Self {
        Rayon {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Dedicated pool with `num_threads` workers
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(GateError::InvalidConfig("rayon policy needs at least one thread".to_string()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("qtile-worker-{}", index))
            .build()?;
        Ok(Rayon {
            num_threads,
            pool: Some(Arc::new(pool)),
        })
    }
}

impl Default for Rayon {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Rayon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rayon")
            .field("num_threads", &self.num_threads)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

impl ParallelPolicy for Rayon {
    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn for_each_block(&self, count: StateInteger, body: &(dyn Fn(Range<StateInteger>, usize) + Sync)) {
        let num_blocks = num_blocks(count, self.num_threads);
        if num_blocks == 0 {
            return;
        }

        let run = || {
            (0..num_blocks)
                .into_par_iter()
                .for_each(|block| body(block_range(count, num_blocks, block), block));
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// Fresh scoped threads per call; block 0 runs on the caller
#[derive(Debug, Clone, Copy)]
pub struct Scoped {
    num_threads: usize,
}

impl Scoped {
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(GateError::InvalidConfig("scoped policy needs at least one thread".to_string()));
        }
        Ok(Scoped { num_threads })
    }
}

impl ParallelPolicy for Scoped {
    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn for_each_block(&self, count: StateInteger, body: &(dyn Fn(Range<StateInteger>, usize) + Sync)) {
        let num_blocks = num_blocks(count, self.num_threads);
        if num_blocks == 0 {
            return;
        }

        let outcome = crossbeam_utils::thread::scope(|scope| {
            for block in 1..num_blocks {
                scope.spawn(move |_| body(block_range(count, num_blocks, block), block));
            }
            body(block_range(count, num_blocks, 0), 0);
        });
        // crossbeam collects worker panics into a Vec; re-raise the first one as is
        if let Err(payload) = outcome {
            match payload.downcast::<Vec<Box<dyn Any + Send + 'static>>>() {
                Ok(mut panics) if !panics.is_empty() => std::panic::resume_unwind(panics.swap_remove(0)),
                Ok(panics) => std::panic::resume_unwind(panics),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
    }
}

/// Which policy a config asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Sequential,
    Rayon,
    Scoped,
}

impl FromStr for PolicyKind {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "seq" => Ok(PolicyKind::Sequential),
            "rayon" | "par" => Ok(PolicyKind::Rayon),
            "scoped" | "threads" => Ok(PolicyKind::Scoped),
            other => Err(GateError::InvalidConfig(format!("unknown policy '{}'", other))),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Sequential => "sequential",
            PolicyKind::Rayon => "rayon",
            PolicyKind::Scoped => "scoped",
        };
        f.write_str(name)
    }
}

/// Element copy `src -> dst` split over the policy's blocks.
/// Both slices must have the same length.
pub fn copy_n<P, T>(policy: &P, src: &[T], dst: &mut [T])
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
{
    debug_assert_eq!(src.len(), dst.len());

    let dst = SharedSlice::new(dst);
    policy.for_each_block(src.len(), &|range, _| {
        // blocks never overlap
        let target = unsafe { dst.slice_mut(range.clone()) };
        target.copy_from_slice(&src[range]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn policies() -> Vec<Box<dyn ParallelPolicy + Send>> {
        vec![
            Box::new(Sequential),
            Box::new(Rayon::with_threads(3).unwrap()),
            Box::new(Scoped::new(4).unwrap()),
        ]
    }

    #[test]
    fn test_block_range_partition() {
        // 10 over 4 blocks: 3, 3, 2, 2
        assert_eq!(block_range(10, 4, 0), 0..3);
        assert_eq!(block_range(10, 4, 1), 3..6);
        assert_eq!(block_range(10, 4, 2), 6..8);
        assert_eq!(block_range(10, 4, 3), 8..10);

        for count in 0..40 {
            for num_blocks in 1..7 {
                let mut next = 0;
                for block in 0..num_blocks {
                    let range = block_range(count, num_blocks, block);
                    assert_eq!(range.start, next);
                    next = range.end;
                }
                assert_eq!(next, count);
            }
        }
    }

    #[test]
    fn test_loop_n_visits_each_index_once() {
        for policy in policies() {
            let hits: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();
            policy.loop_n(hits.len(), &|index, thread_index| {
                assert!(thread_index < policy.num_threads());
                hits[index].fetch_add(1, Ordering::Relaxed);
            });
            assert!(hits.iter().all(|hit| hit.load(Ordering::Relaxed) == 1));
        }
    }

    #[test]
    fn test_thread_index_owns_one_block() {
        for policy in policies() {
            let owners = Mutex::new(vec![usize::MAX; 97]);
            policy.loop_n(97, &|index, thread_index| {
                owners.lock().unwrap()[index] = thread_index;
            });
            let owners = owners.into_inner().unwrap();
            // contiguous blocks: owner never decreases along the range
            assert!(owners.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }

    #[test]
    fn test_empty_loop() {
        for policy in policies() {
            policy.loop_n(0, &|_, _| panic!("no iterations expected"));
        }
    }

    #[test]
    fn test_copy_n() {
        let src: Vec<u64> = (0..513).collect();
        for policy in policies() {
            let mut dst = vec![0u64; src.len()];
            copy_n(&policy, &src, &mut dst);
            assert_eq!(dst, src);
        }
    }

    #[test]
    #[should_panic(expected = "worker failed")]
    fn test_scoped_propagates_panics() {
        let policy = Scoped::new(2).unwrap();
        policy.loop_n(8, &|index, _| {
            if index == 7 {
                panic!("worker failed");
            }
        });
    }

    #[test]
    fn test_policy_kind_parsing() {
        assert_eq!("rayon".parse::<PolicyKind>().unwrap(), PolicyKind::Rayon);
        assert_eq!("Scoped".parse::<PolicyKind>().unwrap(), PolicyKind::Scoped);
        assert_eq!("seq".parse::<PolicyKind>().unwrap(), PolicyKind::Sequential);
        assert!("gpu".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::Rayon.to_string(), "rayon");
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(Scoped::new(0), Err(GateError::InvalidConfig(_))));
        assert!(matches!(Rayon::with_threads(0), Err(GateError::InvalidConfig(_))));
    }
}

//! Cache-staging engines.
//!
//! A state of `num_qubits` qubits is processed through a buffer of `2^num_on_cache_qubits`
//! elements. Bit positions below `num_on_cache_qubits` are on-cache, the rest off-cache.
//!
//! ```text
//!   state index:   [ off-cache bits | chunk qubits | nontag bits ]
//!                                   ^              ^
//!                      num_on_cache_qubits     least significant chunk qubit
//! ```
//!
//! The state is viewed as blocks of `2^least_significant_chunk_qubit` elements. One pass of
//! the tag loop stages `2^num_chunk_qubits` blocks side by side in the buffer, so the chunk
//! qubits of the buffer play the role of the operated qubits that live above the chunk
//! boundary. The no-cache engine then runs on the buffer with the relabelled qubits and the
//! blocks are written back.

use log::{debug, trace};

use crate::error::{GateError, Result};
use crate::gate::amplitudes::{Amplitudes, SharedSlice};
use crate::gate::nocache;
use crate::gate::scratch::ScratchArena;
use crate::index::make_indices_into;
use crate::mask::{make_index_masks, make_qubit_masks};
use crate::policy::{copy_n, ParallelPolicy};
use crate::qubit::{
    all_in_state_vector, integer_exp2, none_in_state_vector, num_qubits_of, raw_qubits, validate_qubits, BitInteger,
    Qubit, RemoveControl, StateInteger,
};

/// Bookkeeping of one staged gate call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub num_qubits: BitInteger,
    pub num_on_cache_qubits: BitInteger,
    /// Lowest bit of the chunk-selector region; everything below it is nontag
    pub least_significant_chunk_qubit: BitInteger,
    pub num_chunk_qubits: BitInteger,
    pub num_operated_off_cache_qubits: BitInteger,
}

impl ChunkLayout {
    /// `sorted_qubits` ascending, distinct, below `num_qubits`, and no more of them than
    /// `num_on_cache_qubits`.
    ///
    /// Walks the on-cache positions downward from the top, taking one free position for
    /// every off-cache operated qubit. On-cache operated positions met on the way stay inside
    /// the chunk region.
    pub fn new(sorted_qubits: &[Qubit], num_qubits: BitInteger, num_on_cache_qubits: BitInteger) -> Self {
        debug_assert!(sorted_qubits.windows(2).all(|pair| pair[0] < pair[1]));
        debug_assert!(sorted_qubits.len() <= num_on_cache_qubits as usize);
        debug_assert!(num_on_cache_qubits <= num_qubits);

        let num_operated_off_cache_qubits =
            sorted_qubits.iter().filter(|qubit| qubit.0 >= num_on_cache_qubits).count() as BitInteger;

        let mut least_significant_chunk_qubit = num_on_cache_qubits;
        let mut num_free_to_absorb = num_operated_off_cache_qubits;
        while num_free_to_absorb > 0 {
            least_significant_chunk_qubit -= 1;
            if sorted_qubits.binary_search(&Qubit(least_significant_chunk_qubit)).is_err() {
                num_free_to_absorb -= 1;
            }
        }

        ChunkLayout {
            num_qubits,
            num_on_cache_qubits,
            least_significant_chunk_qubit,
            num_chunk_qubits: num_on_cache_qubits - least_significant_chunk_qubit,
            num_operated_off_cache_qubits,
        }
    }

    pub fn num_nontag_qubits(&self) -> BitInteger {
        self.least_significant_chunk_qubit
    }

    /// Bits of a block index
    pub fn num_tag_qubits(&self) -> BitInteger {
        (self.num_qubits - self.num_on_cache_qubits) + self.num_chunk_qubits
    }

    pub fn chunk_size(&self) -> StateInteger {
        integer_exp2(self.least_significant_chunk_qubit)
    }

    pub fn num_chunks(&self) -> StateInteger {
        integer_exp2(self.num_chunk_qubits)
    }

    /// Number of staging passes
    pub fn tag_loop_size(&self) -> StateInteger {
        integer_exp2(self.num_qubits - self.num_on_cache_qubits)
    }

    /// Maps the operated qubits (caller order) to positions inside the buffer, and collects
    /// the block-index bits ("tag qubits") of those that sit at or above the chunk boundary.
    /// The `k`-th such qubit lands on chunk position `least_significant_chunk_qubit + k`.
    pub fn relabel(&self, qubits: &[Qubit]) -> (Vec<Qubit>, Vec<Qubit>) {
        let boundary = self.least_significant_chunk_qubit;
        let mut present_chunk_qubit = boundary;
        let mut tag_qubits = Vec::with_capacity(self.num_chunk_qubits as usize);
        let modified_qubits: Vec<Qubit> = qubits
            .iter()
            .map(|&qubit| {
                if qubit.0 < boundary {
                    qubit
                } else {
                    tag_qubits.push(Qubit(qubit.0 - boundary));
                    let chunk_qubit = Qubit(present_chunk_qubit);
                    present_chunk_qubit += 1;
                    chunk_qubit
                }
            })
            .collect();

        debug_assert_eq!(present_chunk_qubit, self.num_on_cache_qubits);
        (modified_qubits, tag_qubits)
    }
}

/// Case 1 without a staging buffer: every operated qubit is on-cache, so each
/// `2^num_on_cache_qubits` tile of `state` is a self-contained no-cache problem.
pub mod all_on_cache {
    use super::*;

    pub fn gate<P, T, F, Q>(
        policy: &P,
        state: &mut [T],
        num_on_cache_qubits: BitInteger,
        transform: F,
        qubits: &[Q],
    ) -> Result<()>
    where
        P: ParallelPolicy + ?Sized,
        T: Send + Sync,
        F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
        Q: RemoveControl,
    {
        let num_qubits = num_qubits_of(state.len())?;
        validate_qubits(num_qubits, qubits)?;
        if let Some(qubit) = raw_qubits(qubits).into_iter().find(|qubit| qubit.0 >= num_on_cache_qubits) {
            return Err(GateError::NotAllOnCache {
                qubit: qubit.0,
                num_on_cache_qubits,
            });
        }

        let tile_size = integer_exp2(std::cmp::min(num_qubits, num_on_cache_qubits));
        let qubit_masks = make_qubit_masks(qubits);
        let index_masks = make_index_masks(qubits);
        let scratch = ScratchArena::new(policy.num_threads(), 1 << qubits.len());

        debug!("gate: {} tiles of {} elements in place", state.len() / tile_size, tile_size);
        for tile in state.chunks_mut(tile_size) {
            nocache::apply(policy, &scratch, tile, &transform, &qubit_masks, &index_masks);
        }
        Ok(())
    }
}

/// Staged engine: Case 1 (through the buffer), Case 2-1 and Case 2-2.
///
/// `staging.len()` fixes `num_on_cache_qubits` and must be a power of two strictly smaller
/// than `state.len()`. Its contents on entry are ignored and unspecified on return.
pub fn gate<P, T, F, Q>(policy: &P, state: &mut [T], staging: &mut [T], transform: F, qubits: &[Q]) -> Result<()>
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
    Q: RemoveControl,
{
    let num_qubits = num_qubits_of(state.len())?;
    let num_on_cache_qubits = num_qubits_of(staging.len())?;
    validate_qubits(num_qubits, qubits)?;
    if num_on_cache_qubits >= num_qubits {
        return Err(GateError::StagingTooLarge {
            num_on_cache_qubits,
            num_qubits,
        });
    }
    if qubits.len() > num_on_cache_qubits as usize {
        return Err(GateError::TooManyOperatedQubits {
            num_operated_qubits: qubits.len(),
            num_on_cache_qubits,
        });
    }

    let qubits = raw_qubits(qubits);
    let mut sorted_qubits = qubits.clone();
    sorted_qubits.sort_unstable();
    let layout = ChunkLayout::new(&sorted_qubits, num_qubits, num_on_cache_qubits);
    staged(policy, state, staging, &transform, &qubits, &layout);
    Ok(())
}

fn staged<P, T, F>(policy: &P, state: &mut [T], staging: &mut [T], transform: &F, qubits: &[Qubit], layout: &ChunkLayout)
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
    F: Fn(&mut Amplitudes<'_, T>, usize) + Sync,
{
    let (modified_qubits, tag_qubits) = layout.relabel(qubits);
    debug_assert!(layout.num_chunk_qubits as usize <= qubits.len());
    debug_assert_eq!(tag_qubits.len(), layout.num_chunk_qubits as usize);
    debug_assert_eq!(layout.num_chunks() * layout.chunk_size(), staging.len());

    let case = if all_in_state_vector(layout.num_on_cache_qubits, qubits) {
        "1"
    } else if none_in_state_vector(layout.num_on_cache_qubits, qubits) {
        "2-1"
    } else {
        "2-2"
    };
    debug!(
        "gate: staged case {} over {} passes, {} chunks of {} elements (qubits {:?} -> {:?})",
        case,
        layout.tag_loop_size(),
        layout.num_chunks(),
        layout.chunk_size(),
        qubits,
        modified_qubits
    );

    let qubit_masks = make_qubit_masks(&modified_qubits);
    let index_masks = make_index_masks(&modified_qubits);
    let tag_qubit_masks = make_qubit_masks(&tag_qubits);
    let tag_index_masks = make_index_masks(&tag_qubits);
    let scratch = ScratchArena::new(policy.num_threads(), 1 << modified_qubits.len());

    let mut tag_indices = vec![0; layout.num_chunks()];
    for tag_index_wo_qubits in 0..layout.tag_loop_size() {
        make_indices_into(tag_index_wo_qubits, &tag_qubit_masks, &tag_index_masks, &mut tag_indices);
        debug_assert_eq!(tag_indices.len(), layout.num_chunks());
        trace!("gate: pass {} stages blocks {:?}", tag_index_wo_qubits, tag_indices);

        gather(policy, state, staging, &tag_indices, layout.least_significant_chunk_qubit);
        nocache::apply(policy, &scratch, staging, transform, &qubit_masks, &index_masks);
        scatter(policy, staging, state, &tag_indices, layout.least_significant_chunk_qubit);
    }
}

// staging[range] -> (staging sub-range, start of the matching run in state), one per block touched
fn segments(
    range: std::ops::Range<StateInteger>,
    tag_indices: &[StateInteger],
    least_significant_chunk_qubit: BitInteger,
) -> impl Iterator<Item = (std::ops::Range<StateInteger>, StateInteger)> + '_ {
    let chunk_size = integer_exp2(least_significant_chunk_qubit);
    let end = range.end;
    let mut position = range.start;
    std::iter::from_fn(move || {
        if position >= end {
            return None;
        }
        let chunk = position >> least_significant_chunk_qubit;
        let offset = position & (chunk_size - 1);
        let segment_end = std::cmp::min(end, (chunk + 1) << least_significant_chunk_qubit);
        let segment = position..segment_end;
        position = segment_end;
        Some((segment, (tag_indices[chunk] << least_significant_chunk_qubit) + offset))
    })
}

fn gather<P, T>(policy: &P, state: &[T], staging: &mut [T], tag_indices: &[StateInteger], least_significant_chunk_qubit: BitInteger)
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
{
    if let [block] = tag_indices {
        let start = block * staging.len();
        copy_n(policy, &state[start..start + staging.len()], staging);
        return;
    }

    let staging = SharedSlice::new(staging);
    policy.for_each_block(staging.len(), &|range, _| {
        for (segment, source) in segments(range, tag_indices, least_significant_chunk_qubit) {
            let length = segment.len();
            // blocks of the policy never overlap
            let target = unsafe { staging.slice_mut(segment) };
            target.copy_from_slice(&state[source..source + length]);
        }
    });
}

fn scatter<P, T>(policy: &P, staging: &[T], state: &mut [T], tag_indices: &[StateInteger], least_significant_chunk_qubit: BitInteger)
where
    P: ParallelPolicy + ?Sized,
    T: Copy + Send + Sync,
{
    if let [block] = tag_indices {
        let start = block * staging.len();
        copy_n(policy, staging, &mut state[start..start + staging.len()]);
        return;
    }

    let state = SharedSlice::new(state);
    policy.for_each_block(staging.len(), &|range, _| {
        for (segment, target) in segments(range, tag_indices, least_significant_chunk_qubit) {
            let length = segment.len();
            // distinct staging offsets map to distinct state offsets
            let destination = unsafe { state.slice_mut(target..target + length) };
            destination.copy_from_slice(&staging[segment]);
        }
    });
}

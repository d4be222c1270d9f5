// Copyright 2024 glacier-list
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Maps logical positions to `(chunk id, offset)` pairs.
//!
//! Chunks are filled strictly left to right: a chunk only receives records
//! once every chunk before it holds exactly `chunk_size` records. Only the
//! tail chunk can be partially filled, which keeps [IndexMapper::locate] a
//! division and a remainder.

use glacier_common::{cal_chunk_idx, cal_chunk_offset, ChunkId, ChunkOffset};
use glacier_storage::ChunkStore;
use snafu::ensure;

use crate::err::{IndexOutOfRangeSnafu, LayoutMismatchSnafu, Result, ZeroStepSnafu};

#[derive(Debug, Clone)]
pub struct IndexMapper {
    chunk_size: usize,
    // (id, record count) in logical order.
    chunks:     Vec<(ChunkId, usize)>,
    len:        usize,
}

impl IndexMapper {
    pub fn new(chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            chunk_size,
            chunks: Vec::new(),
            len: 0,
        }
    }

    /// Rebuild the mapping from chunks found on disk.
    ///
    /// Every chunk but the last must be full and the last must hold at
    /// least one record; anything else means the directory was written with
    /// a different chunk size.
    pub fn from_existing(chunk_size: usize, chunks: Vec<(ChunkId, usize)>) -> Result<Self> {
        let last = chunks.len().saturating_sub(1);
        for (i, &(chunk_id, count)) in chunks.iter().enumerate() {
            let ok = if i == last {
                count >= 1 && count <= chunk_size
            } else {
                count == chunk_size
            };
            ensure!(
                ok,
                LayoutMismatchSnafu {
                    chunk_id,
                    count,
                    expected: chunk_size,
                }
            );
        }
        let len = chunks.iter().map(|(_, n)| n).sum();
        Ok(Self {
            chunk_size,
            chunks,
            len,
        })
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    pub fn chunks(&self) -> &[(ChunkId, usize)] { &self.chunks }

    pub fn chunk_ids(&self) -> Vec<ChunkId> { self.chunks.iter().map(|(id, _)| *id).collect() }

    /// The record count of a chunk, `None` if the chunk is unknown.
    pub fn count_of(&self, id: ChunkId) -> Option<usize> {
        self.chunks
            .iter()
            .find(|(chunk_id, _)| *chunk_id == id)
            .map(|(_, n)| *n)
    }

    /// Turn a possibly negative index into a position in `0..len`.
    pub fn resolve(&self, index: isize) -> Result<usize> {
        let len = self.len as isize;
        let pos = if index < 0 { index + len } else { index };
        ensure!(
            pos >= 0 && pos < len,
            IndexOutOfRangeSnafu {
                index,
                len: self.len,
            }
        );
        Ok(pos as usize)
    }

    pub fn locate(&self, index: isize) -> Result<(ChunkId, ChunkOffset)> {
        let pos = self.resolve(index)?;
        Ok(self.position(pos))
    }

    // pos must be below len.
    fn position(&self, pos: usize) -> (ChunkId, ChunkOffset) {
        let idx = cal_chunk_idx(pos, self.chunk_size);
        (self.chunks[idx].0, cal_chunk_offset(pos, self.chunk_size))
    }

    /// The logical positions selected by `[start:stop:step]`, in selection
    /// order. Bounds are clamped like any sequence slice; an empty selection
    /// is not an error.
    pub fn slice_positions(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    ) -> Result<Vec<usize>> {
        ensure!(step != 0, ZeroStepSnafu);
        let (start, stop) = slice_bounds(self.len as isize, start, stop, step);

        let mut positions = Vec::new();
        let mut next = Some(start);
        while let Some(i) = next {
            if (step > 0 && i >= stop) || (step < 0 && i <= stop) {
                break;
            }
            positions.push(i as usize);
            // a step past isize bounds ends the slice.
            next = i.checked_add(step);
        }
        Ok(positions)
    }

    pub fn locate_range(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    ) -> Result<Vec<(ChunkId, ChunkOffset)>> {
        let positions = self.slice_positions(start, stop, step)?;
        Ok(positions.into_iter().map(|pos| self.position(pos)).collect())
    }

    /// The chunk the next appended record goes to. A fresh id is allocated
    /// from the store when there is no chunk yet or the tail chunk is full;
    /// the new chunk joins the mapping on [IndexMapper::record_added].
    pub fn record_append_slot(&self, store: &ChunkStore) -> (ChunkId, bool) {
        match self.chunks.last() {
            Some(&(id, count)) if count < self.chunk_size => (id, false),
            _ => (store.allocate_id(), true),
        }
    }

    pub fn record_added(&mut self, id: ChunkId) {
        match self.chunks.last_mut() {
            Some((tail, count)) if *tail == id => {
                debug_assert!(*count < self.chunk_size, "tail chunk {} overflow", id);
                *count += 1;
            }
            _ => self.chunks.push((id, 1)),
        }
        self.len += 1;
    }

    /// Account for a record removed from the tail chunk. Returns true when
    /// the chunk became empty and left the mapping.
    pub fn record_removed(&mut self, id: ChunkId) -> bool {
        let Some((tail, count)) = self.chunks.last_mut() else {
            return false;
        };
        debug_assert_eq!(*tail, id, "records are only removed from the tail chunk");
        if *tail != id || *count == 0 {
            return false;
        }
        *count -= 1;
        self.len -= 1;
        if *count == 0 {
            self.chunks.pop();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}

/// Clamp slice bounds the way sequence slicing does.
fn slice_bounds(len: isize, start: Option<isize>, stop: Option<isize>, step: isize) -> (isize, isize) {
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: isize| {
        if bound < 0 {
            (bound + len).max(lower)
        } else {
            bound.min(upper)
        }
    };
    let start = match start {
        Some(s) => clamp(s),
        None if step > 0 => lower,
        None => upper,
    };
    let stop = match stop {
        Some(s) => clamp(s),
        None if step > 0 => upper,
        None => lower,
    };
    (start, stop)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn mapper(chunk_size: usize, n: usize) -> IndexMapper {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(tempdir.path()).unwrap();
        let mut index = IndexMapper::new(chunk_size);
        for _ in 0..n {
            let (id, _) = index.record_append_slot(&store);
            index.record_added(id);
        }
        index
    }

    // reference slicing over 0..len, written with ranges.
    fn reference(len: usize, start: Option<isize>, stop: Option<isize>, step: isize) -> Vec<usize> {
        let n = len as isize;
        if step > 0 {
            let norm = |b: isize| if b < 0 { (b + n).max(0) } else { b.min(n) };
            let s = start.map(norm).unwrap_or(0);
            let e = stop.map(norm).unwrap_or(n);
            if s >= e {
                return Vec::new();
            }
            (s..e).step_by(step as usize).map(|i| i as usize).collect()
        } else {
            let norm = |b: isize| if b < 0 { (b + n).max(-1) } else { b.min(n - 1) };
            let s = start.map(norm).unwrap_or(n - 1);
            let e = stop.map(norm).unwrap_or(-1);
            if s <= e {
                return Vec::new();
            }
            ((e + 1)..=s)
                .rev()
                .step_by(step.unsigned_abs())
                .map(|i| i as usize)
                .collect()
        }
    }

    #[test]
    fn seven_records_in_chunks_of_three() {
        let index = mapper(3, 7);
        assert_eq!(index.len(), 7);
        let counts: Vec<usize> = index.chunks().iter().map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![3, 3, 1]);
        assert_eq!(index.chunk_ids(), vec![0, 1, 2]);

        assert_eq!(index.locate(5).unwrap(), (1, 2));
        assert_eq!(index.locate(-1).unwrap(), (2, 0));
        assert_eq!(index.locate(-7).unwrap(), (0, 0));
        assert!(index.locate(7).unwrap_err().is_index_error());
        assert!(index.locate(-8).unwrap_err().is_index_error());

        assert_eq!(
            index.locate_range(Some(2), Some(6), 1).unwrap(),
            vec![(0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn append_slot_allocates_when_full() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(tempdir.path()).unwrap();
        let mut index = IndexMapper::new(2);
        assert_eq!(index.record_append_slot(&store), (0, true));
        index.record_added(0);
        assert_eq!(index.record_append_slot(&store), (0, false));
        index.record_added(0);
        assert_eq!(index.record_append_slot(&store), (1, true));
    }

    #[test]
    fn slice_edges() {
        let index = mapper(3, 7);
        // python: list(range(7))[::-1]
        assert_eq!(
            index.slice_positions(None, None, -1).unwrap(),
            vec![6, 5, 4, 3, 2, 1, 0]
        );
        // [-100:100]
        assert_eq!(index.slice_positions(Some(-100), Some(100), 1).unwrap().len(), 7);
        // [5:2]
        assert!(index.slice_positions(Some(5), Some(2), 1).unwrap().is_empty());
        // [5:2:-2]
        assert_eq!(index.slice_positions(Some(5), Some(2), -2).unwrap(), vec![5, 3]);
        // [-2::-3]
        assert_eq!(index.slice_positions(Some(-2), None, -3).unwrap(), vec![5, 2]);
        // [10::-1]
        assert_eq!(index.slice_positions(Some(10), None, -1).unwrap().len(), 7);
        assert!(matches!(
            index.slice_positions(None, None, 0).unwrap_err(),
            crate::Error::ZeroStep { .. }
        ));

        // [5::MAX], [1::MIN] and [::MAX] pick a single element.
        assert_eq!(index.slice_positions(Some(5), None, isize::MAX).unwrap(), vec![5]);
        assert_eq!(index.slice_positions(None, None, isize::MAX).unwrap(), vec![0]);
        assert_eq!(index.slice_positions(Some(1), None, isize::MIN).unwrap(), vec![1]);
        assert_eq!(index.slice_positions(None, None, isize::MIN).unwrap(), vec![6]);
        assert_eq!(
            index.locate_range(Some(-1), None, isize::MAX).unwrap(),
            vec![(2, 0)]
        );

        let empty = IndexMapper::new(3);
        assert!(empty.slice_positions(None, None, -1).unwrap().is_empty());
        assert!(empty.locate(0).unwrap_err().is_index_error());
    }

    #[test]
    fn random_slices_match_reference() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let chunk_size = rng.gen_range(1..6);
            let len = rng.gen_range(0..30);
            let index = mapper(chunk_size, len);
            let pick = |rng: &mut rand::rngs::ThreadRng| {
                if rng.gen_bool(0.2) {
                    None
                } else {
                    Some(rng.gen_range(-40..40))
                }
            };
            let start = pick(&mut rng);
            let stop = pick(&mut rng);
            let mut step = rng.gen_range(-4..5);
            if step == 0 {
                step = 1;
            }
            let got = index.slice_positions(start, stop, step).unwrap();
            assert_eq!(got, reference(len, start, stop, step));
            for (pos, (id, off)) in got.iter().zip(index.locate_range(start, stop, step).unwrap()) {
                assert_eq!(index.locate(*pos as isize).unwrap(), (id, off));
            }
        }
    }

    #[test]
    fn removing_the_tail() {
        let mut index = mapper(3, 4);
        assert!(index.record_removed(1));
        assert_eq!(index.chunk_count(), 1);
        assert_eq!(index.len(), 3);
        assert!(!index.record_removed(0));
        assert_eq!(index.len(), 2);
        assert_eq!(index.count_of(0), Some(2));
    }

    #[test]
    fn rebuild_from_existing() {
        let index = IndexMapper::from_existing(3, vec![(4, 3), (7, 3), (9, 2)]).unwrap();
        assert_eq!(index.len(), 8);
        assert_eq!(index.locate(6).unwrap(), (9, 0));

        let err = IndexMapper::from_existing(3, vec![(0, 2), (1, 3)]).unwrap_err();
        assert!(matches!(err, crate::Error::LayoutMismatch { chunk_id: 0, .. }));
        assert!(IndexMapper::from_existing(3, vec![(0, 3), (1, 0)]).is_err());
        assert!(IndexMapper::from_existing(3, vec![(0, 4)]).is_err());
        assert!(IndexMapper::from_existing(3, vec![]).unwrap().is_empty());
    }
}

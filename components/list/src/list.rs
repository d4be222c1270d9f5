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

use std::{
    convert::Infallible,
    fmt::{Display, Formatter},
    num::NonZeroUsize,
    path::Path,
    sync::Arc,
};

use glacier_common::{ChunkId, ChunkOffset};
use glacier_storage::{ChunkStore, ChunkStoreRef};
use glacier_types::Record;
use snafu::{ensure, ResultExt};
use tracing::{debug, error, info, instrument};

use crate::{
    cache::WorkingSet,
    config::Config,
    err::{InvalidConfigSnafu, LayoutMismatchSnafu, LengthMismatchSnafu, Result, StorageSnafu},
    index::IndexMapper,
    normalize::{JsonDenormalizer, JsonNormalizer, Normalize},
    transform,
};

/// A list of records that keeps only a few chunks in memory.
///
/// Methods take `&mut self` even for reads because a read may load a chunk
/// and evict another; the list is meant to be driven by one caller at a
/// time. Dropping the list flushes dirty chunks; call [GlacierList::close]
/// to see flush errors instead of having them logged.
pub struct GlacierList {
    config: Config,
    store:  ChunkStoreRef,
    index:  IndexMapper,
    cache:  WorkingSet,
    closed: bool,
}

impl GlacierList {
    /// Open the list stored under `config.storage_dir`. Chunks left there by
    /// an earlier session are picked up again.
    #[instrument(skip_all, fields(dir = ?config.storage_dir))]
    pub fn open(config: Config) -> Result<GlacierList> {
        config.validate()?;
        let store = Arc::new(ChunkStore::open(&config.storage_dir).context(StorageSnafu)?);
        let mut chunks = Vec::with_capacity(store.existing_ids().len());
        for &id in store.existing_ids() {
            let count = store.peek_len(id).context(StorageSnafu)?;
            chunks.push((id, count));
        }
        let index = IndexMapper::from_existing(config.chunk_size, chunks)?;
        let capacity = NonZeroUsize::new(config.cache_capacity).ok_or_else(|| {
            InvalidConfigSnafu {
                reason: "cache_capacity must be at least 1",
            }
            .build()
        })?;
        let cache = WorkingSet::new(store.clone(), capacity);
        info!(
            "open glacier list with {} records in {} chunks",
            index.len(),
            index.chunk_count()
        );
        Ok(GlacierList {
            config,
            store,
            index,
            cache,
            closed: false,
        })
    }

    /// Flush every dirty chunk and release the list.
    #[instrument(skip_all, fields(dir = ?self.config.storage_dir))]
    pub fn close(mut self) -> Result<()> {
        self.cache.flush_all()?;
        self.closed = true;
        info!("closed glacier list with {} records", self.index.len());
        Ok(())
    }

    /// Remove every chunk file and release the list.
    #[instrument(skip_all, fields(dir = ?self.config.storage_dir))]
    pub fn destroy(mut self) -> Result<()> {
        self.delete_all()?;
        self.closed = true;
        Ok(())
    }

    /// Remove every record and every chunk file; the list stays usable.
    ///
    /// The list is empty afterwards even when a chunk file could not be
    /// removed; the error is still returned.
    pub fn delete_all(&mut self) -> Result<()> {
        let deleted = self.store.delete_all().context(StorageSnafu);
        self.cache.invalidate();
        let chunks = self.index.chunk_count();
        self.index.clear();
        deleted?;
        info!("deleted {} chunks", chunks);
        Ok(())
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn storage_dir(&self) -> &Path { self.store.dir() }

    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    pub fn chunk_count(&self) -> usize { self.index.chunk_count() }

    pub fn chunk_size(&self) -> usize { self.index.chunk_size() }

    /// `(chunk id, record count)` for every chunk, in order.
    pub fn chunks(&self) -> &[(ChunkId, usize)] { self.index.chunks() }

    /// The record at `index`; negative indices count from the end.
    pub fn get(&mut self, index: isize) -> Result<Record> {
        let (id, offset) = self.index.locate(index)?;
        let chunk = self.cache.get(id)?;
        record_at(chunk, id, offset).cloned()
    }

    /// A detached copy of the records selected by `[start:stop:step]`.
    pub fn get_slice(
        &mut self,
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    ) -> Result<Vec<Record>> {
        let located = self.index.locate_range(start, stop, step)?;
        let mut out = Vec::with_capacity(located.len());
        // one cache lookup per run of positions within the same chunk.
        let mut i = 0;
        while i < located.len() {
            let id = located[i].0;
            let chunk = self.cache.get(id)?;
            while i < located.len() && located[i].0 == id {
                out.push(record_at(chunk, id, located[i].1)?.clone());
                i += 1;
            }
        }
        Ok(out)
    }

    /// Replace the record at `index`. Only [GlacierList::append] grows the
    /// list, so an index past the end is an error.
    pub fn set(&mut self, index: isize, record: Record) -> Result<()> {
        let (id, offset) = self.index.locate(index)?;
        let chunk = self.cache.get_mutable(id)?;
        let count = chunk.len();
        match chunk.get_mut(offset) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => LayoutMismatchSnafu {
                chunk_id: id,
                count,
                expected: offset + 1,
            }
            .fail(),
        }
    }

    /// Replace the records selected by `[start:stop:step]`. The replacement
    /// must hold exactly as many records as the slice selects; the list never
    /// changes length through slice assignment.
    pub fn set_slice(
        &mut self,
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
        records: Vec<Record>,
    ) -> Result<()> {
        let located = self.index.locate_range(start, stop, step)?;
        ensure!(
            located.len() == records.len(),
            LengthMismatchSnafu {
                expected: located.len(),
                actual:   records.len(),
            }
        );
        let mut records = records.into_iter();
        let mut i = 0;
        while i < located.len() {
            let id = located[i].0;
            let chunk = self.cache.get_mutable(id)?;
            while i < located.len() && located[i].0 == id {
                let offset = located[i].1;
                let count = chunk.len();
                let (Some(slot), Some(record)) = (chunk.get_mut(offset), records.next()) else {
                    return LayoutMismatchSnafu {
                        chunk_id: id,
                        count,
                        expected: offset + 1,
                    }
                    .fail();
                };
                *slot = record;
                i += 1;
            }
        }
        Ok(())
    }

    pub fn append(&mut self, record: Record) -> Result<()> {
        let (id, is_new) = self.index.record_append_slot(&self.store);
        let chunk = if is_new {
            debug!("start chunk {}", id);
            self.cache.insert_new(id)?
        } else {
            self.cache.get_mutable(id)?
        };
        chunk.push(record);
        self.index.record_added(id);
        Ok(())
    }

    pub fn extend<I: IntoIterator<Item = Record>>(&mut self, records: I) -> Result<()> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Remove and return the last record. A chunk that becomes empty is
    /// removed from disk; its id is not handed out again.
    pub fn pop(&mut self) -> Result<Option<Record>> {
        let Some(&(id, count)) = self.index.chunks().last() else {
            return Ok(None);
        };
        let chunk = self.cache.get_mutable(id)?;
        let Some(record) = chunk.pop() else {
            return LayoutMismatchSnafu {
                chunk_id: id,
                count: 0usize,
                expected: count,
            }
            .fail();
        };
        if count == 1 {
            if let Err(e) = self.store.remove(id) {
                // still resident, so this never touches the disk.
                self.cache.get_mutable(id)?.push(record);
                return Err(e).context(StorageSnafu);
            }
            self.cache.discard(id);
        }
        self.index.record_removed(id);
        Ok(Some(record))
    }

    /// Walk every record in order, one chunk at a time.
    ///
    /// The chunk boundaries are captured when the iterator is created; the
    /// iterator can be recreated at any time to start over.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            chunks:     self.index.chunks().to_vec(),
            cache:      &mut self.cache,
            next_chunk: 0,
            current:    Vec::new().into_iter(),
            failed:     false,
        }
    }

    /// Every record, combined into one in-memory vector.
    pub fn to_vec(&mut self) -> Result<Vec<Record>> {
        let mut out = Vec::with_capacity(self.len());
        for record in self.iter() {
            out.push(record?);
        }
        Ok(out)
    }

    /// Apply `f` to every record in place, using the configured number of
    /// workers.
    pub fn map<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Record) -> Record + Sync,
    {
        let workers = self.config.workers;
        self.map_with(f, workers)
    }

    pub fn map_with<F>(&mut self, f: F, workers: usize) -> Result<()>
    where
        F: Fn(Record) -> Record + Sync,
    {
        self.try_map_with(|r| Ok::<_, Infallible>(f(r)), workers)
    }

    pub fn try_map<F, E>(&mut self, f: F) -> Result<()>
    where
        F: Fn(Record) -> std::result::Result<Record, E> + Sync,
        E: std::error::Error + Send + Sync + 'static,
    {
        let workers = self.config.workers;
        self.try_map_with(f, workers)
    }

    /// Apply a fallible `f` to every record with `workers` threads.
    ///
    /// On failure the chunks that failed keep their previous content while
    /// the others are transformed; the returned error lists the failed chunk
    /// ids.
    #[instrument(skip_all, fields(workers = workers))]
    pub fn try_map_with<F, E>(&mut self, f: F, workers: usize) -> Result<()>
    where
        F: Fn(Record) -> std::result::Result<Record, E> + Sync,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cache.flush_all()?;
        let chunks = self.index.chunk_ids();
        let result = transform::run(&self.store, &chunks, workers, &f);
        // resident copies may be stale now, whatever the outcome.
        self.cache.invalidate();
        result
    }

    /// Normalize every field of every record with `normalizer`.
    pub fn normalize_with<N: Normalize>(&mut self, normalizer: N) -> Result<()> {
        self.map(move |record| normalizer.normalize_record(record))
    }

    /// Store containers and booleans as JSON text.
    pub fn serialize(&mut self) -> Result<()> { self.normalize_with(JsonNormalizer) }

    /// Turn JSON text written by [GlacierList::serialize] back into values.
    pub fn deserialize(&mut self) -> Result<()> { self.normalize_with(JsonDenormalizer) }

    /// Write every dirty chunk to disk.
    pub fn flush(&mut self) -> Result<()> { self.cache.flush_all() }

    #[cfg(test)]
    pub(crate) fn working_set(&self) -> &WorkingSet { &self.cache }
}

fn record_at(chunk: &[Record], id: ChunkId, offset: ChunkOffset) -> Result<&Record> {
    chunk.get(offset).ok_or_else(|| {
        LayoutMismatchSnafu {
            chunk_id: id,
            count:    chunk.len(),
            expected: offset + 1,
        }
        .build()
    })
}

impl Display for GlacierList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GlacierList({} items, {} chunks)",
            self.index.len(),
            self.index.chunk_count()
        )
    }
}

impl Drop for GlacierList {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.cache.flush_all() {
            error!("failed to flush glacier list on drop: {}", e);
        }
    }
}

/// Iterator returned by [GlacierList::iter].
pub struct Iter<'a> {
    cache:      &'a mut WorkingSet,
    // chunk boundaries as of the iterator's creation.
    chunks:     Vec<(ChunkId, usize)>,
    next_chunk: usize,
    current:    std::vec::IntoIter<Record>,
    failed:     bool,
}

impl Iterator for Iter<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            if self.failed || self.next_chunk >= self.chunks.len() {
                return None;
            }
            let (id, count) = self.chunks[self.next_chunk];
            self.next_chunk += 1;
            match self.cache.get(id) {
                Ok(records) => {
                    let n = count.min(records.len());
                    self.current = records[..n].to_vec().into_iter();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let rest: usize = self.chunks[self.next_chunk..].iter().map(|(_, n)| n).sum();
        (0, Some(self.current.len() + rest))
    }
}

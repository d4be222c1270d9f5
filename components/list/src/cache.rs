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

//! The working set: the chunks currently materialized in memory.
//!
//! At most `capacity` chunks are resident, evicted in least recently used
//! order. A resident chunk is dirty from the moment it is handed out for
//! mutation until it is written back. Eviction writes a dirty victim first;
//! if that write fails the victim stays resident and the error goes back to
//! the caller, nothing is dropped silently.

use std::num::NonZeroUsize;

use glacier_common::ChunkId;
use glacier_storage::ChunkStoreRef;
use glacier_types::Record;
use lru::LruCache;
use snafu::ResultExt;
use tracing::debug;

use crate::err::{Result, StorageSnafu};

struct Resident {
    records: Vec<Record>,
    dirty:   bool,
}

pub struct WorkingSet {
    store:  ChunkStoreRef,
    chunks: LruCache<ChunkId, Resident>,
}

impl WorkingSet {
    pub fn new(store: ChunkStoreRef, capacity: NonZeroUsize) -> Self {
        Self {
            store,
            chunks: LruCache::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize { self.chunks.cap().get() }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    /// Resident chunk ids, most recently used first.
    pub fn resident_ids(&self) -> Vec<ChunkId> { self.chunks.iter().map(|(id, _)| *id).collect() }

    /// `None` when the chunk is not resident.
    pub fn is_dirty(&self, id: ChunkId) -> Option<bool> { self.chunks.peek(&id).map(|r| r.dirty) }

    pub fn get(&mut self, id: ChunkId) -> Result<&[Record]> {
        let resident = self.resident(id)?;
        Ok(resident.records.as_slice())
    }

    /// Like [WorkingSet::get], but the chunk is marked dirty right away since
    /// any mutable access is assumed to mutate.
    pub fn get_mutable(&mut self, id: ChunkId) -> Result<&mut Vec<Record>> {
        let resident = self.resident(id)?;
        resident.dirty = true;
        Ok(&mut resident.records)
    }

    /// Make a brand new, empty chunk resident. It has no file yet, so it
    /// starts out dirty.
    pub fn insert_new(&mut self, id: ChunkId) -> Result<&mut Vec<Record>> {
        debug_assert!(!self.chunks.contains(&id), "chunk {} is already resident", id);
        self.make_room()?;
        self.chunks.put(
            id,
            Resident {
                records: Vec::new(),
                dirty:   true,
            },
        );
        debug!("new chunk {} is resident", id);
        self.resident(id).map(|r| &mut r.records)
    }

    /// Write every dirty chunk back, leaving all of them resident and clean.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut flushed = 0;
        for (id, resident) in self.chunks.iter_mut() {
            if resident.dirty {
                self.store.save(*id, &resident.records).context(StorageSnafu)?;
                resident.dirty = false;
                flushed += 1;
            }
        }
        if flushed > 0 {
            debug!("flushed {} dirty chunks", flushed);
        }
        Ok(())
    }

    /// Drop every resident chunk without writing anything.
    pub fn invalidate(&mut self) {
        if !self.chunks.is_empty() {
            debug!("invalidate {} resident chunks", self.chunks.len());
        }
        self.chunks.clear();
    }

    /// Drop one chunk without writing it.
    pub fn discard(&mut self, id: ChunkId) { self.chunks.pop(&id); }

    fn resident(&mut self, id: ChunkId) -> Result<&mut Resident> {
        if !self.chunks.contains(&id) {
            self.make_room()?;
            let records = self.store.load(id).context(StorageSnafu)?;
            debug!("load chunk {} with {} records", id, records.len());
            self.chunks.put(
                id,
                Resident {
                    records,
                    dirty: false,
                },
            );
        }
        match self.chunks.get_mut(&id) {
            Some(resident) => Ok(resident),
            None => unreachable!("chunk {} was just made resident", id),
        }
    }

    // Evict until there is a free slot.
    fn make_room(&mut self) -> Result<()> {
        while self.chunks.len() >= self.chunks.cap().get() {
            let Some((&victim, resident)) = self.chunks.peek_lru() else {
                break;
            };
            if resident.dirty {
                self.store.save(victim, &resident.records).context(StorageSnafu)?;
                debug!("flush chunk {} before eviction", victim);
            }
            self.chunks.pop_lru();
            debug!("evict chunk {}", victim);
        }
        Ok(())
    }
}

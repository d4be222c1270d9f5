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

//! The on-disk home of every chunk.
//!
//! Each chunk lives in its own file, `chunk_<id>.bin`, inside one storage
//! directory. Callers only ever address chunks by [ChunkId]; the naming is
//! private to this module. Writes go to a temporary file in the same
//! directory first and are renamed over the target, so an interrupted write
//! never leaves a half written chunk behind.

use std::{
    fmt::{Display, Formatter},
    fs,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use crossbeam::atomic::AtomicCell;
use dashmap::DashSet;
use glacier_common::{chunk_file_name, parse_chunk_file_name, ChunkId};
use glacier_types::Record;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    codec,
    err::{ChunkNotFoundSnafu, CodecSnafu, CorruptChunkSnafu, IoSnafu, PersistSnafu, Result},
};

const TMP_PREFIX: &str = ".chunk_";
const TMP_SUFFIX: &str = ".tmp";

pub type ChunkStoreRef = Arc<ChunkStore>;

pub struct ChunkStore {
    dir:      PathBuf,
    // the next id to hand out, ids are never reused.
    next_id:  AtomicCell<ChunkId>,
    // every chunk that has a file in the directory.
    on_disk:  DashSet<ChunkId>,
    // chunks found when the store was opened, ascending.
    existing: Vec<ChunkId>,
}

impl ChunkStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    ///
    /// Chunk files left by an earlier session are discovered so that newly
    /// allocated ids never collide with them. Temporary files left by an
    /// interrupted write are removed; anything else in the directory is left
    /// alone.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<ChunkStore> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context(IoSnafu { path: dir.clone() })?;

        let mut existing = Vec::new();
        for entry in fs::read_dir(&dir).context(IoSnafu { path: dir.clone() })? {
            let entry = entry.context(IoSnafu { path: dir.clone() })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = parse_chunk_file_name(name) {
                existing.push(id);
            } else if name.starts_with(TMP_PREFIX) && name.ends_with(TMP_SUFFIX) {
                warn!("removing leftover temporary chunk file {:?}", entry.path());
                remove_if_exists(&entry.path())?;
            }
        }
        existing.sort_unstable();

        let next_id = existing.last().map(|id| id + 1).unwrap_or(0);
        let on_disk = DashSet::with_capacity(existing.len());
        existing.iter().for_each(|id| {
            on_disk.insert(*id);
        });
        debug!(
            "open chunk store at {:?}, found {} chunks, next id {}",
            dir,
            existing.len(),
            next_id
        );

        Ok(ChunkStore {
            dir,
            next_id: AtomicCell::new(next_id),
            on_disk,
            existing,
        })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Chunks that were already on disk when the store was opened, ascending.
    pub fn existing_ids(&self) -> &[ChunkId] { &self.existing }

    /// The number of chunk files currently in the directory.
    pub fn file_count(&self) -> usize { self.on_disk.len() }

    pub fn allocate_id(&self) -> ChunkId { self.next_id.fetch_add(1) }

    pub fn contains(&self, id: ChunkId) -> bool { self.on_disk.contains(&id) }

    /// Persist the bytes of a chunk, replacing any previous content
    /// atomically. Safe to call concurrently for different ids.
    pub fn write(&self, id: ChunkId, buf: &[u8]) -> Result<()> {
        let path = self.chunk_path(id);
        let mut tmp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .suffix(TMP_SUFFIX)
            .tempfile_in(&self.dir)
            .context(IoSnafu {
                path: self.dir.clone(),
            })?;
        tmp.write_all(buf).context(IoSnafu {
            path: tmp.path().to_path_buf(),
        })?;
        tmp.as_file().sync_all().context(IoSnafu {
            path: tmp.path().to_path_buf(),
        })?;
        tmp.persist(&path).context(PersistSnafu { path })?;
        self.on_disk.insert(id);
        debug!("write chunk {}, {} bytes", id, buf.len());
        Ok(())
    }

    pub fn read(&self, id: ChunkId) -> Result<Bytes> {
        let path = self.chunk_path(id);
        match fs::read(&path) {
            Ok(buf) => {
                debug!("read chunk {}, {} bytes", id, buf.len());
                Ok(Bytes::from(buf))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => ChunkNotFoundSnafu { chunk_id: id, path }.fail(),
            Err(e) => Err(e).context(IoSnafu { path }),
        }
    }

    /// Read and decode a chunk.
    pub fn load(&self, id: ChunkId) -> Result<Vec<Record>> {
        let buf = self.read(id)?;
        codec::decode(&buf).context(CorruptChunkSnafu { chunk_id: id })
    }

    /// Encode and write a chunk.
    pub fn save(&self, id: ChunkId, records: &[Record]) -> Result<()> {
        let buf = codec::encode(records).context(CodecSnafu { chunk_id: id })?;
        self.write(id, &buf)
    }

    /// The record count of a chunk, read from its header only.
    pub fn peek_len(&self, id: ChunkId) -> Result<usize> {
        let path = self.chunk_path(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return ChunkNotFoundSnafu { chunk_id: id, path }.fail()
            }
            Err(e) => return Err(e).context(IoSnafu { path }),
        };
        let mut header = Vec::with_capacity(codec::HEADER_LEN);
        file.take(codec::HEADER_LEN as u64)
            .read_to_end(&mut header)
            .context(IoSnafu { path })?;
        codec::peek_len(&header).context(CorruptChunkSnafu { chunk_id: id })
    }

    /// Remove a single chunk file. Removing a missing chunk is not an error.
    pub fn remove(&self, id: ChunkId) -> Result<()> {
        remove_if_exists(&self.chunk_path(id))?;
        self.on_disk.remove(&id);
        debug!("remove chunk {}", id);
        Ok(())
    }

    /// Remove every chunk file this store knows about. The directory itself
    /// stays. Calling it again is a no-op.
    pub fn delete_all(&self) -> Result<()> {
        let ids: Vec<ChunkId> = self.on_disk.iter().map(|id| *id).collect();
        for id in ids.iter().chain(self.existing.iter()) {
            remove_if_exists(&self.chunk_path(*id))?;
            self.on_disk.remove(id);
        }
        debug!("delete {} chunks under {:?}", ids.len(), self.dir);
        Ok(())
    }

    fn chunk_path(&self, id: ChunkId) -> PathBuf { self.dir.join(chunk_file_name(id)) }
}

impl Display for ChunkStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ChunkStore {{ dir: {:?}, chunks: {}, next_id: {} }}",
            self.dir,
            self.on_disk.len(),
            self.next_id.load(),
        )
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(IoSnafu {
            path: path.to_path_buf(),
        }),
    }
}

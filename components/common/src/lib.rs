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

pub const GLACIER: &str = "glacier";
pub const GLACIER_DEBUG_STORAGE_DIR: &str = "/tmp/glacier.chunks";

// The default number of records in one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
// One resident chunk is enough for sequential access.
pub const DEFAULT_CACHE_CAPACITY: usize = 1;

pub const CHUNK_FILE_PREFIX: &str = "chunk_";
pub const CHUNK_FILE_SUFFIX: &str = ".bin";

pub type ChunkId = u64;
pub type ChunkIndex = usize;
pub type ChunkOffset = usize;

pub fn cal_chunk_idx(pos: usize, chunk_size: usize) -> ChunkIndex { pos / chunk_size }

pub fn cal_chunk_offset(pos: usize, chunk_size: usize) -> ChunkOffset { pos % chunk_size }

/// The file name a chunk is stored under, `chunk_<id>.bin`.
pub fn chunk_file_name(id: ChunkId) -> String {
    format!("{}{}{}", CHUNK_FILE_PREFIX, id, CHUNK_FILE_SUFFIX)
}

/// Parse the chunk id back out of a file name, `None` for anything that is
/// not a chunk file. Only the exact name [chunk_file_name] produces is
/// accepted, so `chunk_05.bin` or `chunk_+5.bin` are not chunk files.
pub fn parse_chunk_file_name(name: &str) -> Option<ChunkId> {
    let id: ChunkId = name
        .strip_prefix(CHUNK_FILE_PREFIX)?
        .strip_suffix(CHUNK_FILE_SUFFIX)?
        .parse()
        .ok()?;
    (chunk_file_name(id) == name).then_some(id)
}

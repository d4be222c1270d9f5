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

use std::path::PathBuf;

use glacier_common::ChunkId;
use snafu::{Location, Snafu};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("chunk {} not found at {:?}", chunk_id, path))]
    ChunkNotFound {
        chunk_id: ChunkId,
        path:     PathBuf,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("chunk {} is corrupt: {}", chunk_id, source))]
    CorruptChunk {
        chunk_id: ChunkId,
        source:   crate::codec::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to encode chunk {}: {}", chunk_id, source))]
    Codec {
        chunk_id: ChunkId,
        source:   crate::codec::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("io error on {:?}: {}", path, source))]
    Io {
        path:     PathBuf,
        source:   std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to replace {:?}: {}", path, source))]
    Persist {
        path:     PathBuf,
        source:   tempfile::PersistError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool { matches!(self, Error::ChunkNotFound { .. }) }

    pub fn is_corrupt(&self) -> bool { matches!(self, Error::CorruptChunk { .. }) }

    pub fn is_codec(&self) -> bool { matches!(self, Error::Codec { .. }) }

    /// The chunk the error is about, if any.
    pub fn chunk_id(&self) -> Option<ChunkId> {
        match self {
            Error::ChunkNotFound { chunk_id, .. }
            | Error::CorruptChunk { chunk_id, .. }
            | Error::Codec { chunk_id, .. } => Some(*chunk_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

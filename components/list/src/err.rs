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

use glacier_common::ChunkId;
use snafu::{Location, Snafu};

use crate::transform::ChunkFailure;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("index {} out of range for length {}", index, len))]
    IndexOutOfRange {
        index:    isize,
        len:      usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("slice step cannot be zero"))]
    ZeroStep {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "attempt to assign {} records to a slice of {} records",
        actual,
        expected
    ))]
    LengthMismatch {
        expected: usize,
        actual:   usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("chunk {} holds {} records, expect {}", chunk_id, count, expected))]
    LayoutMismatch {
        chunk_id: ChunkId,
        count:    usize,
        expected: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("invalid config: {}", reason))]
    InvalidConfig {
        reason:   String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{}", source))]
    Storage {
        source:   glacier_storage::err::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "transform failed on {} chunk(s): {}",
        failures.len(),
        describe_failures(failures)
    ))]
    Transform {
        failures: Vec<ChunkFailure>,
        #[snafu(implicit)]
        location: Location,
    },
}

fn describe_failures(failures: &[ChunkFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn is_index_error(&self) -> bool { matches!(self, Error::IndexOutOfRange { .. }) }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage { source, .. } if source.is_not_found())
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Storage { source, .. } if source.is_corrupt())
    }

    pub fn is_codec(&self) -> bool { matches!(self, Error::Storage { source, .. } if source.is_codec()) }

    pub fn is_transform(&self) -> bool { matches!(self, Error::Transform { .. }) }

    /// The chunks a transform failed on, ascending.
    pub fn failed_chunks(&self) -> Vec<ChunkId> {
        match self {
            Error::Transform { failures, .. } => failures.iter().map(|f| f.chunk_id).collect(),
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

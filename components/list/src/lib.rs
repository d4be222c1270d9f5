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

//! A list of [Record]s that lives on disk.
//!
//! The collection is split into chunks of a fixed number of records. Each
//! chunk is stored in its own file, and only a small working set of chunks
//! is kept in memory at any time, so the memory footprint depends on the
//! chunk size rather than on the total number of records.
//!
//! ```no_run
//! use glacier_list::{Config, GlacierList, Record};
//!
//! let mut list = GlacierList::open(Config::new("/tmp/glacier.demo").with_chunk_size(1000))?;
//! for i in 0..10_000 {
//!     list.append(Record::new().with("id", i))?;
//! }
//! assert_eq!(list.get(-1)?.get("id").and_then(|v| v.as_i64()), Some(9_999));
//! list.close()?;
//! # Ok::<(), glacier_list::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod err;
pub mod index;
pub mod list;
pub mod normalize;
pub mod transform;

pub use config::Config;
pub use err::{Error, Result};
pub use glacier_types::{Record, Value};
pub use list::{GlacierList, Iter};
pub use normalize::{JsonDenormalizer, JsonNormalizer, Normalize};

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

use std::path::{Path, PathBuf};

use glacier_utils::env::{glacier_key, var, var_parsed};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::err::{InvalidConfigSnafu, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The directory holding the chunk files.
    pub storage_dir:    PathBuf,
    /// How many records one chunk holds.
    pub chunk_size:     usize,
    /// How many chunks may be resident at once. One is enough for purely
    /// sequential or single point access, more helps when two regions of the
    /// list are worked on in turn.
    pub cache_capacity: usize,
    /// The default number of threads [crate::GlacierList::map] uses.
    pub workers:        usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir:    PathBuf::from(glacier_common::GLACIER_DEBUG_STORAGE_DIR),
            chunk_size:     glacier_common::DEFAULT_CHUNK_SIZE,
            cache_capacity: glacier_common::DEFAULT_CACHE_CAPACITY,
            workers:        glacier_utils::num_cpus::get(),
        }
    }
}

impl Config {
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_storage_dir<P: AsRef<Path>>(mut self, storage_dir: P) -> Self {
        self.storage_dir = storage_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// The default config overlaid with `GLACIER_STORAGE_DIR`,
    /// `GLACIER_CHUNK_SIZE`, `GLACIER_CACHE_CAPACITY` and `GLACIER_WORKERS`.
    pub fn from_env() -> Result<Self> { Self::default().overlay_env() }

    /// Overlay whichever `GLACIER_*` variables are set.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Some(dir) = var(&glacier_key("storage_dir")).map_err(env_error)? {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(n) = var_parsed(&glacier_key("chunk_size")).map_err(env_error)? {
            self.chunk_size = n;
        }
        if let Some(n) = var_parsed(&glacier_key("cache_capacity")).map_err(env_error)? {
            self.cache_capacity = n;
        }
        if let Some(n) = var_parsed(&glacier_key("workers")).map_err(env_error)? {
            self.workers = n;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.chunk_size > 0,
            InvalidConfigSnafu {
                reason: "chunk_size must be at least 1",
            }
        );
        ensure!(
            self.cache_capacity > 0,
            InvalidConfigSnafu {
                reason: "cache_capacity must be at least 1",
            }
        );
        ensure!(
            self.workers > 0,
            InvalidConfigSnafu {
                reason: "workers must be at least 1",
            }
        );
        Ok(())
    }
}

fn env_error(e: snafu::Whatever) -> crate::err::Error {
    InvalidConfigSnafu {
        reason: e.to_string(),
    }
    .build()
}

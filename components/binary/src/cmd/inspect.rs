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

use clap::Args;
use glacier_common::DEFAULT_CHUNK_SIZE;
use glacier_list::{Config, GlacierList};
use snafu::{ensure_whatever, ResultExt, Whatever};

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Open an existing chunk directory and print its layout. Chunk files are left
as they are; temporary files left by an interrupted write are removed. The
chunk size must match the one the list was built with.
")]
pub struct InspectArgs {
    #[arg(long, help = "Directory holding the chunk files", value_name = "DIRECTORY")]
    pub dir: PathBuf,

    #[arg(long, help = "Records per chunk", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, help = "Also print the first record of every chunk")]
    pub verbose: bool,
}

impl InspectArgs {
    pub fn run(&self) -> Result<(), Whatever> {
        glacier_utils::logger::install_fmt_log();
        ensure_whatever!(self.dir.is_dir(), "{:?} is not a chunk directory", self.dir);
        let config = Config::new(&self.dir).with_chunk_size(self.chunk_size);
        let mut list = GlacierList::open(config)
            .with_whatever_context(|_| format!("open chunk directory {:?}", self.dir))?;

        println!("{}", list);
        let chunks = list.chunks().to_vec();
        let mut pos = 0;
        for (id, count) in chunks {
            println!("chunk {:>6}: {} records", id, count);
            if self.verbose {
                let first = list
                    .get(pos as isize)
                    .with_whatever_context(|_| format!("read chunk {}", id))?;
                println!("    {}", first);
            }
            pos += count;
        }
        list.close().whatever_context("close list")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glacier_list::Record;

    use super::*;

    fn args(dir: PathBuf) -> InspectArgs {
        InspectArgs {
            dir,
            chunk_size: 3,
            verbose: true,
        }
    }

    #[test]
    fn missing_directory_is_not_created() {
        let tempdir = tempfile::tempdir().unwrap();
        let dir = tempdir.path().join("absent");
        assert!(args(dir.clone()).run().is_err());
        assert!(!dir.exists());
    }

    #[test]
    fn existing_list_is_left_intact() {
        let tempdir = tempfile::tempdir().unwrap();
        let dir = tempdir.path().to_path_buf();
        let mut list = GlacierList::open(Config::new(&dir).with_chunk_size(3)).unwrap();
        list.extend((0..5).map(|i: i64| Record::new().with("id", i))).unwrap();
        list.close().unwrap();

        args(dir.clone()).run().unwrap();
        let mut list = GlacierList::open(Config::new(&dir).with_chunk_size(3)).unwrap();
        assert_eq!(list.len(), 5);
        assert_eq!(list.get(-1).unwrap(), Record::new().with("id", 4i64));
    }
}

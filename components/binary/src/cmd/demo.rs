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
use glacier_list::{Config, GlacierList, Record};
use snafu::{ResultExt, Whatever};
use tracing::info;

const DEMO_OPTIONS_HEADER: &str = "Demo options";

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Build a small list of ten records, print a few of them and remove the
chunk files again.
")]
pub struct DemoArgs {
    #[arg(
        long,
        help = "Directory for the chunk files",
        help_heading = DEMO_OPTIONS_HEADER,
        value_name = "DIRECTORY",
        default_value = "/tmp/glacier.demo"
    )]
    pub dir: PathBuf,

    #[arg(
        long,
        help = "Records per chunk",
        help_heading = DEMO_OPTIONS_HEADER,
        default_value = "5",
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    pub chunk_size: u32,
}

impl DemoArgs {
    pub fn run(&self) -> Result<(), Whatever> {
        glacier_utils::logger::install_fmt_log();
        let config = Config::new(&self.dir)
            .with_chunk_size(self.chunk_size as usize)
            .with_cache_capacity(1);
        let mut list = GlacierList::open(config).whatever_context("open demo list")?;
        list.extend((0..10).map(|i: i64| {
            Record::new()
                .with("id", i)
                .with("name", format!("item_{}", i))
                .with("value", i * 10)
        }))
        .whatever_context("fill demo list")?;

        println!("{}", list);
        println!("first: {}", list.get(0).whatever_context("read first record")?);
        println!("last: {}", list.get(-1).whatever_context("read last record")?);
        let slice = list
            .get_slice(Some(3), Some(7), 1)
            .whatever_context("read slice")?;
        println!("[3:7]:");
        for record in &slice {
            println!("  {}", record);
        }

        list.destroy().whatever_context("remove demo chunks")?;
        info!("demo finished, chunk files under {:?} removed", self.dir);
        Ok(())
    }
}

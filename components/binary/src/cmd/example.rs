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

use std::{path::PathBuf, time::Instant};

use clap::Args;
use glacier_list::{Config, GlacierList, Record, Value};
use snafu::{ResultExt, Whatever};
use tracing::info;

const EXAMPLE_OPTIONS_HEADER: &str = "Example options";

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Fill a list with generated contact records, transform them in parallel,
round-trip them through JSON normalization and remove the chunk files.
Unset options fall back to GLACIER_* environment variables, then defaults.
")]
pub struct ExampleArgs {
    #[arg(
        long,
        help = "Number of records to generate",
        help_heading = EXAMPLE_OPTIONS_HEADER,
        default_value = "1000000"
    )]
    pub count: u64,

    #[arg(long, help = "Directory for the chunk files", help_heading = EXAMPLE_OPTIONS_HEADER, value_name = "DIRECTORY")]
    pub dir: Option<PathBuf>,

    #[arg(long, help = "Records per chunk", help_heading = EXAMPLE_OPTIONS_HEADER)]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "Threads used by map", help_heading = EXAMPLE_OPTIONS_HEADER)]
    pub workers: Option<usize>,
}

impl ExampleArgs {
    fn config(&self) -> Result<Config, Whatever> {
        let mut config = Config::from_env().whatever_context("read config from environment")?;
        if let Some(dir) = &self.dir {
            config = config.with_storage_dir(dir);
        }
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        Ok(config)
    }

    pub fn run(&self) -> Result<(), Whatever> {
        glacier_utils::logger::install_fmt_log();
        let config = self.config()?;
        info!("run example with {} records and {:?}", self.count, config);
        let mut list = GlacierList::open(config).whatever_context("open example list")?;

        let start = Instant::now();
        for i in 0..self.count {
            list.append(contact(i)).whatever_context("append record")?;
        }
        println!("filled {} in {:?}", list, start.elapsed());

        let start = Instant::now();
        list.map(|mut r| {
            let full_name = match (r.get("first_name"), r.get("last_name")) {
                (Some(Value::Text(first)), Some(Value::Text(last))) => format!("{} {}", first, last),
                _ => String::new(),
            };
            r.insert("full_name", full_name);
            r
        })
        .whatever_context("add full names")?;
        println!("mapped {} records in {:?}", list.len(), start.elapsed());

        let start = Instant::now();
        list.serialize().whatever_context("serialize records")?;
        list.deserialize().whatever_context("deserialize records")?;
        println!("normalized round trip in {:?}", start.elapsed());

        if !list.is_empty() {
            println!("middle record: {}", list.get(list.len() as isize / 2).whatever_context("read record")?);
        }
        list.destroy().whatever_context("remove example chunks")?;
        Ok(())
    }
}

fn contact(i: u64) -> Record {
    Record::new()
        .with("id", i as i64)
        .with("first_name", format!("first{}", i))
        .with("last_name", format!("last{}", i % 1_000))
        .with("email", format!("user{}@example.com", i))
        .with("active", i % 3 != 0)
        .with("tags", vec![format!("group{}", i % 7), "newsletter".to_string()])
        .with(
            "metadata",
            Record::new()
                .with("score", (i % 100) as f64 / 10.0)
                .with("visits", (i % 50) as i64),
        )
}

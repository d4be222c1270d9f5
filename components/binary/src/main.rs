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

mod cmd;

use clap::{Parser, Subcommand};
use snafu::Whatever;

use crate::cmd::{demo::DemoArgs, example::ExampleArgs, inspect::InspectArgs};

#[derive(Debug, Parser)]
#[clap(
name = "glacier",
about = "disk-backed record list tools",
version)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Demo(DemoArgs),
    Example(ExampleArgs),
    Inspect(InspectArgs),
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Demo(demo_args) => demo_args.run(),
        Commands::Example(example_args) => example_args.run(),
        Commands::Inspect(inspect_args) => inspect_args.run(),
    }
}

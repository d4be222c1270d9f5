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

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// The variable that overrides the default filter directive.
pub const GLACIER_LOG: &str = "GLACIER_LOG";
pub const DEFAULT_FILTER: &str = "info";

/// Install a stdout fmt layer filtered by `GLACIER_LOG`, falling back to
/// `default_filter`.
///
/// Installing twice is harmless, the second call is ignored, so tests can
/// call this freely.
pub fn install_log(default_filter: &str) {
    let env_filter = create_env_filter(default_filter);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true);
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Shortcut used by tests and the binary.
pub fn install_fmt_log() { install_log(DEFAULT_FILTER) }

fn create_env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(GLACIER_LOG).unwrap_or_else(|_| EnvFilter::new(filter))
}

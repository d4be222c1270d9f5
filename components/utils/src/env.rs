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

use std::{error::Error, str::FromStr};

use snafu::{whatever, ResultExt, Whatever};

/// The name of a glacier environment variable, `GLACIER_<NAME>`.
pub fn glacier_key(name: &str) -> String {
    format!("{}_{}", glacier_common::GLACIER.to_uppercase(), name.to_uppercase())
}

/// Reads an environment variable for the current process.
///
/// Differences from [std::env::var]:
///
/// - the `.env` file in the current or parent directories is loaded through
///   [dotenvy] before the lookup.
/// - an unset variable is `Ok(None)` rather than an error.
#[track_caller]
pub fn var(key: &str) -> Result<Option<String>, Whatever> {
    match dotenvy::var(key) {
        Ok(content) => Ok(Some(content)),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(None),
        Err(error) => whatever!(Err(error), "Failed to read {key} environment variable"),
    }
}

/// Like [var], parsing the content when the variable is set.
#[track_caller]
pub fn var_parsed<R>(key: &str) -> Result<Option<R>, Whatever>
where
    R: FromStr,
    R::Err: Error + Send + Sync + 'static,
{
    match var(key)? {
        Some(content) => {
            let parsed = content
                .trim()
                .parse()
                .with_whatever_context(|e| format!("Failed to parse {key} environment variable; {e}"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading the [`LoaderConfig`] from disk.

use anyhow::{Context, Result};
use kiln_core::LoaderConfig;
use std::path::Path;

/// Reads a JSON [`LoaderConfig`] from `path`. Missing keys keep their default.
pub fn load_config(path: impl AsRef<Path>) -> Result<LoaderConfig> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read loader config '{}'", path.display()))?;
    let config = LoaderConfig::from_json_str(&json)
        .with_context(|| format!("Failed to parse loader config '{}'", path.display()))?;
    log::debug!("Loaded loader config from '{}': {config:?}", path.display());
    Ok(config)
}

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

//! Loader configuration.
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it overrides:
//!
//! ```
//! use kiln_core::LoaderConfig;
//!
//! let config = LoaderConfig::from_json_str(r#"{ "worker_count": 4 }"#).unwrap();
//! assert_eq!(config.worker_count, 4);
//! assert_eq!(config.finalize_budget_per_update, 8);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the worker threads and the owning-thread update loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of worker threads decoding resources in parallel. Clamped to at least 1.
    pub worker_count: usize,
    /// Optional cap on worker ticks per second. `None` runs as fast as work arrives.
    pub worker_frequency_hz: Option<u32>,
    /// How long an idle worker parks between ticks, in microseconds.
    pub idle_sleep_us: u64,
    /// Cap of the exponential cooldown (in skipped ticks) applied to tasks that
    /// keep reporting that they are still running.
    pub max_backoff_ticks: u32,
    /// Number of executions after which a still-running task is dropped and reported.
    pub max_task_ticks: u32,
    /// Timeout handed to the fence check when polling uploads, in nanoseconds.
    pub fence_timeout_ns: u64,
    /// Whether polling an upload fence also flushes the command stream.
    pub flush_on_poll: bool,
    /// Maximum number of finalize steps performed by a single owning-thread update.
    pub finalize_budget_per_update: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            worker_frequency_hz: None,
            idle_sleep_us: 1_000,
            max_backoff_ticks: 8,
            max_task_ticks: 10_000,
            fence_timeout_ns: 0,
            flush_on_poll: true,
            finalize_budget_per_update: 8,
        }
    }
}

impl LoaderConfig {
    /// Parses a configuration from JSON. Missing keys keep their default value.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The effective worker count (never zero).
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.max(1)
    }

    /// The time budget of one worker tick, if a frequency cap is configured.
    pub fn worker_tick_budget(&self) -> Option<Duration> {
        self.worker_frequency_hz
            .filter(|hz| *hz > 0)
            .map(|hz| Duration::from_nanos(1_000_000_000 / u64::from(hz)))
    }

    /// The idle park duration of a worker.
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_micros(self.idle_sleep_us)
    }
}

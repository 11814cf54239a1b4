//! Local Inference Pool configuration (spec §4.2, §5, §6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for [`crate::pool::LocalInferencePool`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads available for inference compute. Defaults to the
    /// number of physical/logical cores detected at startup (spec §4.2:
    /// "a pool of worker threads sized to the number of physical cores by
    /// default").
    pub worker_threads: usize,

    /// Timeout for loading (mmap + context construction) one model (spec
    /// §4.2 default 60s, §6 `model_load_timeout_seconds`).
    pub model_load_timeout: Duration,

    /// Per-generation timeout (spec §5, §6 `generation_timeout_seconds`).
    pub generation_timeout: Duration,

    /// Sum of `weight_bytes * 1.2` across loaded handles may not exceed
    /// this (spec §5 "Resource policy").
    pub memory_budget_bytes: u64,

    /// When set, `generate`/`generate_stream` short-circuit to the
    /// deterministic heuristic generator instead of touching any model
    /// handle (spec §4.2 "Demo-mode fallback").
    pub demo_mode: bool,

    /// Bounded channel capacity for a single streaming generation (spec §5
    /// "produce tokens into a bounded, back-pressured channel").
    pub stream_channel_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            model_load_timeout: Duration::from_secs(60),
            generation_timeout: Duration::from_secs(120),
            memory_budget_bytes: 8 * 1024 * 1024 * 1024,
            demo_mode: false,
            stream_channel_capacity: 64,
        }
    }
}

impl PoolConfig {
    /// Applies the `model_load_timeout_seconds` / `generation_timeout_seconds`
    /// / `memory_budget_bytes` / `demo_mode` keys from a
    /// [`lalo_foundation::LaloConfig`] onto defaults otherwise sized from
    /// detected hardware.
    pub fn from_lalo_config(cfg: &lalo_foundation::LaloConfig) -> Self {
        Self {
            model_load_timeout: Duration::from_secs(cfg.model_load_timeout_seconds),
            generation_timeout: Duration::from_secs(cfg.generation_timeout_seconds),
            memory_budget_bytes: cfg.memory_budget_bytes,
            demo_mode: cfg.demo_mode,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_worker_threads_is_nonzero() {
        assert!(PoolConfig::default().worker_threads > 0);
    }

    #[test]
    fn from_lalo_config_carries_timeouts_and_demo_mode() {
        let mut lalo_cfg = lalo_foundation::LaloConfig::default();
        lalo_cfg.demo_mode = true;
        lalo_cfg.model_load_timeout_seconds = 5;
        let pool_cfg = PoolConfig::from_lalo_config(&lalo_cfg);
        assert!(pool_cfg.demo_mode);
        assert_eq!(pool_cfg.model_load_timeout, Duration::from_secs(5));
    }
}

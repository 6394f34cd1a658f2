//! Memory back-pressure for parallel fetch phases.
//!
//! Before a parallel phase submits more work it asks the [`MemoryGuard`] for
//! headroom. While system memory utilization is above the ceiling the guard
//! stalls, re-sampling on a fixed interval, and lets work through anyway once
//! the overall stall cap is reached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use sysinfo::System;
use tokio::time::Instant;

use crate::constants::{DEFAULT_MEMORY_CEILING_PERCENT, MEMORY_MAX_WAIT_SECS, MEMORY_POLL_INTERVAL_SECS};

/// Source of system memory utilization samples, as a percentage.
pub trait MemorySampler: Send + Sync {
    fn used_percent(&self) -> f64;
}

/// Samples host memory through `sysinfo`.
pub struct SystemMemorySampler {
    system: Mutex<System>,
}

impl SystemMemorySampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for SystemMemorySampler {
    fn used_percent(&self) -> f64 {
        let Ok(mut system) = self.system.lock() else {
            return 0.0;
        };
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        system.used_memory() as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
pub struct MemoryGuardConfig {
    /// Utilization percentage above which submission pauses.
    pub ceiling_percent: f64,
    pub poll_interval: Duration,
    /// Longest single stall before work proceeds regardless.
    pub max_wait: Duration,
}

impl Default for MemoryGuardConfig {
    fn default() -> Self {
        Self {
            ceiling_percent: DEFAULT_MEMORY_CEILING_PERCENT,
            poll_interval: Duration::from_secs(MEMORY_POLL_INTERVAL_SECS),
            max_wait: Duration::from_secs(MEMORY_MAX_WAIT_SECS),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryGuardStats {
    pub checks: AtomicU64,
    pub stalls: AtomicU64,
    pub stall_duration_ms: AtomicU64,
    pub forced_through: AtomicU64,
}

/// Result of one headroom check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Headroom {
    /// Below the ceiling on the first sample.
    Available,
    /// Dropped below the ceiling after stalling.
    AvailableAfterStall(Duration),
    /// Still above the ceiling when the stall cap ran out.
    ForcedThrough(Duration),
}

pub struct MemoryGuard {
    config: MemoryGuardConfig,
    sampler: Arc<dyn MemorySampler>,
    stats: MemoryGuardStats,
}

impl MemoryGuard {
    pub fn new(config: MemoryGuardConfig, sampler: Arc<dyn MemorySampler>) -> Self {
        Self {
            config,
            sampler,
            stats: MemoryGuardStats::default(),
        }
    }

    /// Guard backed by host memory sampling.
    pub fn system(config: MemoryGuardConfig) -> Self {
        Self::new(config, Arc::new(SystemMemorySampler::new()))
    }

    pub fn stats(&self) -> &MemoryGuardStats {
        &self.stats
    }

    /// Waits until utilization is at or below the ceiling, or the stall cap
    /// has elapsed.
    pub async fn wait_for_headroom(&self) -> Headroom {
        self.stats.checks.fetch_add(1, Ordering::Relaxed);
        let mut used = self.sampler.used_percent();
        if used <= self.config.ceiling_percent {
            return Headroom::Available;
        }

        self.stats.stalls.fetch_add(1, Ordering::Relaxed);
        warn!(
            "[Memory] utilization {:.1}% above ceiling {:.1}%, pausing submission",
            used, self.config.ceiling_percent
        );

        let started = Instant::now();
        let outcome = loop {
            let waited = started.elapsed();
            if waited >= self.config.max_wait {
                self.stats.forced_through.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "[Memory] still at {:.1}% after {:?}, continuing anyway",
                    used, waited
                );
                break Headroom::ForcedThrough(waited);
            }
            let remaining = self.config.max_wait - waited;
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;

            used = self.sampler.used_percent();
            if used <= self.config.ceiling_percent {
                let waited = started.elapsed();
                debug!("[Memory] utilization back to {:.1}% after {:?}", used, waited);
                break Headroom::AvailableAfterStall(waited);
            }
        };

        let waited = match outcome {
            Headroom::Available => Duration::ZERO,
            Headroom::AvailableAfterStall(waited) | Headroom::ForcedThrough(waited) => waited,
        };
        self.stats
            .stall_duration_ms
            .fetch_add(waited.as_millis() as u64, Ordering::Relaxed);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted samples, repeating the last one.
    struct ScriptedSampler {
        samples: Mutex<VecDeque<f64>>,
    }

    impl ScriptedSampler {
        fn new(samples: &[f64]) -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(samples.iter().copied().collect()),
            })
        }
    }

    impl MemorySampler for ScriptedSampler {
        fn used_percent(&self) -> f64 {
            let mut samples = self.samples.lock().unwrap();
            if samples.len() > 1 {
                samples.pop_front().unwrap()
            } else {
                samples.front().copied().unwrap_or(0.0)
            }
        }
    }

    fn guard(samples: &[f64]) -> MemoryGuard {
        MemoryGuard::new(MemoryGuardConfig::default(), ScriptedSampler::new(samples))
    }

    #[tokio::test(start_paused = true)]
    async fn below_ceiling_passes_immediately() {
        let guard = guard(&[40.0]);
        assert_eq!(guard.wait_for_headroom().await, Headroom::Available);
        assert_eq!(guard.stats().stalls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalls_until_memory_drops() {
        let guard = guard(&[90.0, 85.0, 60.0]);
        match guard.wait_for_headroom().await {
            Headroom::AvailableAfterStall(waited) => assert!(waited >= Duration::from_secs(6)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(guard.stats().stalls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_stall_cap() {
        let guard = guard(&[95.0]);
        match guard.wait_for_headroom().await {
            Headroom::ForcedThrough(waited) => assert!(waited >= Duration::from_secs(60)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(guard.stats().forced_through.load(Ordering::Relaxed), 1);
    }
}

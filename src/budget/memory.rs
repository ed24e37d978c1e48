use crate::foundation::error::{RegenError, RegenResult};
use std::sync::Arc;

/// Source of "how much memory can we still use" information.
pub trait MemoryProbe: Send + Sync {
    /// Currently available memory in bytes, or `None` when it cannot be determined.
    fn available_bytes(&self) -> Option<u64>;
}

/// Probe backed by the operating system (`MemAvailable` from `/proc/meminfo` on Linux).
///
/// Returns `None` on platforms without that interface.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMemoryProbe;

impl MemoryProbe for SystemMemoryProbe {
    fn available_bytes(&self) -> Option<u64> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        let text = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&text)
    }
}

/// Probe reporting a fixed amount of available memory. Handy for tests and reproducible runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedMemoryProbe(pub u64);

impl MemoryProbe for FixedMemoryProbe {
    fn available_bytes(&self) -> Option<u64> {
        Some(self.0)
    }
}

pub(crate) fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let rest = meminfo
        .lines()
        .find_map(|l| l.strip_prefix("MemAvailable:"))?;
    let mut fields = rest.split_whitespace();
    let value = fields.next()?.parse::<u64>().ok()?;
    let scale = match fields.next() {
        Some("kB") | Some("KB") => 1024,
        Some("mB") | Some("MB") => 1024 * 1024,
        None => 1,
        Some(_) => return None,
    };
    Some(value.saturating_mul(scale))
}

/// Cost model for working copies.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MemoryBudgetOpts {
    /// Cost of one copy relative to the source footprint.
    pub clone_cost_multiplier: f64,
    /// Fraction of the available memory that is never handed out to copies, in `[0, 1)`.
    pub reserve_fraction: f64,
}

impl Default for MemoryBudgetOpts {
    fn default() -> Self {
        Self {
            clone_cost_multiplier: 1.0,
            reserve_fraction: 0.1,
        }
    }
}

impl MemoryBudgetOpts {
    /// Check value ranges.
    pub fn validate(&self) -> RegenResult<()> {
        if !(self.clone_cost_multiplier.is_finite() && self.clone_cost_multiplier > 0.0) {
            return Err(RegenError::validation(
                "memory.clone_cost_multiplier must be a finite value > 0",
            ));
        }
        if !(0.0..1.0).contains(&self.reserve_fraction) {
            return Err(RegenError::validation(
                "memory.reserve_fraction must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Decides how many working copies a run can afford.
#[derive(Clone)]
pub struct MemoryBudgetEstimator {
    opts: MemoryBudgetOpts,
    probe: Arc<dyn MemoryProbe>,
}

impl std::fmt::Debug for MemoryBudgetEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBudgetEstimator")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl MemoryBudgetEstimator {
    /// Create an estimator using `probe` for the available-memory figure.
    pub fn new(opts: MemoryBudgetOpts, probe: Arc<dyn MemoryProbe>) -> Self {
        Self { opts, probe }
    }

    /// Estimator backed by [`SystemMemoryProbe`].
    pub fn system(opts: MemoryBudgetOpts) -> Self {
        Self::new(opts, Arc::new(SystemMemoryProbe))
    }

    /// Worker count in `[1, requested_max]` (a `requested_max` of 0 is treated as 1).
    ///
    /// Never fails: when memory is short it degrades to a single worker, and when the available
    /// memory is unknown or the footprint is zero it grants `requested_max`.
    pub fn estimate_worker_count(&self, footprint_bytes: u64, requested_max: usize) -> usize {
        let max = requested_max.max(1);
        let Some(available) = self.probe.available_bytes() else {
            tracing::debug!(max, "available memory unknown, granting requested worker count");
            return max;
        };
        let affordable = affordable_copies(available, footprint_bytes, &self.opts);
        let workers = usize::try_from(affordable).unwrap_or(usize::MAX).clamp(1, max);
        tracing::debug!(
            available,
            footprint_bytes,
            affordable,
            workers,
            "estimated worker count"
        );
        workers
    }
}

/// Number of copies of a `footprint_bytes` document that fit in `available_bytes`.
pub(crate) fn affordable_copies(
    available_bytes: u64,
    footprint_bytes: u64,
    opts: &MemoryBudgetOpts,
) -> u64 {
    if footprint_bytes == 0 {
        return u64::MAX;
    }
    let usable = available_bytes as f64 * (1.0 - opts.reserve_fraction.clamp(0.0, 1.0));
    let per_copy = footprint_bytes as f64 * opts.clone_cost_multiplier.max(f64::MIN_POSITIVE);
    let n = (usable / per_copy).floor();
    if n.is_finite() && n > 0.0 {
        n as u64
    } else {
        0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/budget/memory.rs"]
mod tests;

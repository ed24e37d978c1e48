use crate::budget::memory::MemoryBudgetOpts;
use crate::foundation::core::Region;
use crate::foundation::error::{RegenError, RegenResult};
use std::path::Path;
use std::time::Duration;

/// Options controlling a regeneration run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegenOpts {
    /// First line of the progress status text.
    pub action_title: String,
    /// Upper bound on worker slots. `None` uses the available parallelism.
    pub max_workers: Option<usize>,
    /// Unattended mode: a frame failure fails the whole run and no indicator is shown.
    pub batch_mode: bool,
    /// Delay before the progress indicator is shown, in milliseconds.
    pub busy_wait_ms: u64,
    /// How often the orchestrator checks for cancellation while waiting, in milliseconds.
    pub poll_interval_ms: u64,
    /// Smoothing factor in `(0, 1]` for the remaining-time estimate.
    pub eta_smoothing: f64,
    /// Area regenerated in each frame; empty means the whole frame.
    pub region_of_interest: Region,
    /// Working-copy cost model.
    pub memory: MemoryBudgetOpts,
}

impl Default for RegenOpts {
    fn default() -> Self {
        Self {
            action_title: "Regenerating frames".to_string(),
            max_workers: None,
            batch_mode: false,
            busy_wait_ms: 200,
            poll_interval_ms: 20,
            eta_smoothing: 0.3,
            region_of_interest: Region::new(),
            memory: MemoryBudgetOpts::default(),
        }
    }
}

impl RegenOpts {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> RegenResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| RegenError::validation(format!("invalid options JSON: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read options from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> RegenResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RegenError::Other(anyhow::Error::new(e).context(format!(
                "read options '{}'",
                path.display()
            )))
        })?;
        Self::from_json_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> RegenResult<()> {
        if self.max_workers == Some(0) {
            return Err(RegenError::validation("max_workers must be >= 1 when set"));
        }
        if self.poll_interval_ms == 0 {
            return Err(RegenError::validation("poll_interval_ms must be >= 1"));
        }
        if !(self.eta_smoothing > 0.0 && self.eta_smoothing <= 1.0) {
            return Err(RegenError::validation("eta_smoothing must be in (0, 1]"));
        }
        self.memory.validate()
    }

    /// `max_workers`, or the machine's available parallelism.
    pub fn resolved_max_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub(crate) fn busy_wait(&self) -> Duration {
        Duration::from_millis(self.busy_wait_ms)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/regen/opts.rs"]
mod tests;

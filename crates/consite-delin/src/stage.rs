use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use consite_core::errors::{ErrorInfo, SiteError};

/// Stages a proto-site moves through while being assembled into sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Member buffer blocks and evidence are selected.
    Start,
    /// The proto-site is grown into a window and exclusion layers are clipped.
    BuildProcessingWindow,
    /// Erase polygons are synthesised from the clipped layers.
    SynthesizeExclusions,
    /// Buffer blocks are carved with the erase polygons.
    Chop,
    /// The proto-site is carved into split sites.
    EraseProtoSite,
    /// Each split site is re-consolidated from its buffer-block fragments.
    PerSplitSite,
    /// Split-site results are merged into the final boundary.
    Remerge,
    /// Sites are handed to the writer.
    Commit,
}

impl Stage {
    /// Stable label used in logs, reports and scratch keys.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::BuildProcessingWindow => "build-processing-window",
            Stage::SynthesizeExclusions => "synthesize-exclusions",
            Stage::Chop => "chop",
            Stage::EraseProtoSite => "erase-proto-site",
            Stage::PerSplitSite => "per-split-site",
            Stage::Remerge => "remerge",
            Stage::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cooperative wall-clock budget for one proto-site.
///
/// The budget is checked at stage boundaries only, so a single long
/// geometry call can overrun it.
#[derive(Debug, Clone)]
pub struct StageClock {
    started: Instant,
    budget: Option<Duration>,
}

impl StageClock {
    /// Starts a clock with an optional budget.
    pub fn start(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Milliseconds elapsed since the clock started.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Fails with a unit error once the budget is spent.
    pub fn check(&self, stage: Stage) -> Result<(), SiteError> {
        let Some(budget) = self.budget else {
            return Ok(());
        };
        let elapsed = self.started.elapsed();
        if elapsed >= budget {
            return Err(SiteError::Unit(
                ErrorInfo::new("unit_timeout", "proto-site exceeded its time budget")
                    .with_context("stage", stage)
                    .with_context("elapsed_ms", elapsed.as_millis())
                    .with_context("budget_ms", budget.as_millis())
                    .with_hint("raise execution.unit_timeout_secs or shrink the consolidation distance"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spent_budget_is_a_unit_failure() {
        let clock = StageClock::start(Some(Duration::ZERO));
        let err = clock.check(Stage::Chop).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.info().code, "unit_timeout");
        assert_eq!(err.info().context["stage"], "chop");
    }

    #[test]
    fn unbounded_clock_never_expires() {
        let clock = StageClock::start(None);
        assert!(clock.check(Stage::Remerge).is_ok());
    }
}

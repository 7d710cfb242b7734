//! Conversion metadata keys and run status

use std::fmt;
use std::str::FromStr;

pub const TOOL_VERSION: &str = "tool_version";
pub const RUN_STARTED_AT: &str = "run_started_at";
pub const RUN_STATUS: &str = "run_status";
pub const RUN_FINISHED_AT: &str = "run_finished_at";
/// Next source position to read
pub const CHECKPOINT: &str = "checkpoint";
/// Events inserted across all runs
pub const TOTAL_EVENTS: &str = "total_events";
/// Unix seconds of the last completed conversion
pub const LAST_CONVERSION: &str = "last_conversion";

/// Terminal or in-progress state of the latest run, as stored in `run_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "interrupted" => Ok(RunStatus::Interrupted),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_round_trips_through_text() {
        for status in [
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>(), Ok(status));
        }
        assert!("paused".parse::<RunStatus>().is_err());
    }
}

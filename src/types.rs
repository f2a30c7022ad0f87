use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// State of one task instance within a run.
///
/// Transitions only move forward:
///
/// ```text
/// Pending -> Running -> Success | Failed
///                    \-> Pending            (retry re-enqueue)
/// Pending -> Skipped | UpstreamFailed
/// ```
///
/// `Success`, `Failed`, `Skipped` and `UpstreamFailed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    UpstreamFailed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failed | TaskState::Skipped | TaskState::UpstreamFailed
        )
    }

    /// Terminal states that count towards a successful run.
    pub fn is_successful(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Skipped)
    }

    /// `Failed` or `UpstreamFailed`.
    pub fn is_failure(self) -> bool {
        matches!(self, TaskState::Failed | TaskState::UpstreamFailed)
    }

    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Pending, UpstreamFailed)
                | (Running, Success)
                | (Running, Failed)
                | (Running, Pending)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
            TaskState::UpstreamFailed => "upstream_failed",
        };
        f.write_str(s)
    }
}

/// Policy deciding whether a task may run given the states of its direct
/// upstream tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    /// Every upstream succeeded (default).
    #[default]
    AllSuccess,
    /// Every upstream failed or upstream-failed.
    AllFailed,
    /// Every upstream is terminal, whatever the outcome.
    AllDone,
    /// At least one upstream succeeded.
    OneSuccess,
    /// At least one upstream failed or upstream-failed.
    OneFailed,
    /// Every upstream is terminal and none failed.
    NoneFailed,
    /// Every upstream is terminal and none was skipped.
    NoneSkipped,
    /// Run as soon as the run starts, regardless of upstream.
    Always,
}

impl FromStr for TriggerRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all_success" => Ok(TriggerRule::AllSuccess),
            "all_failed" => Ok(TriggerRule::AllFailed),
            "all_done" => Ok(TriggerRule::AllDone),
            "one_success" => Ok(TriggerRule::OneSuccess),
            "one_failed" => Ok(TriggerRule::OneFailed),
            "none_failed" => Ok(TriggerRule::NoneFailed),
            "none_skipped" => Ok(TriggerRule::NoneSkipped),
            "always" => Ok(TriggerRule::Always),
            other => Err(format!(
                "invalid trigger_rule: {other} (expected one of all_success, all_failed, \
                 all_done, one_success, one_failed, none_failed, none_skipped, always)"
            )),
        }
    }
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerRule::AllSuccess => "all_success",
            TriggerRule::AllFailed => "all_failed",
            TriggerRule::AllDone => "all_done",
            TriggerRule::OneSuccess => "one_success",
            TriggerRule::OneFailed => "one_failed",
            TriggerRule::NoneFailed => "none_failed",
            TriggerRule::NoneSkipped => "none_skipped",
            TriggerRule::Always => "always",
        };
        f.write_str(s)
    }
}

/// Where run state is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateStoreMode {
    /// Keep run state in memory only (lost on exit).
    #[default]
    Memory,
    /// Store one TOML file per run under `[config].state_dir`.
    File,
}

//! Run report - what happened to every tool of one invocation
//!
//! Kept in memory for the end-of-run summary only.

use crate::core::{ProcessResult, ToolStatus};
use chrono::{DateTime, Local};
use std::fmt;

/// How a target's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Completed,
    /// No tools selected
    Skipped,
    Interrupted,
    /// Stopped by a fatal error
    Aborted,
}

/// How the whole run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Completed,
    Interrupted,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetRun {
    pub target: String,
    pub state: TargetState,
    pub results: Vec<ProcessResult>,
}

/// Per-status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl Tally {
    fn add(&mut self, status: ToolStatus) {
        match status {
            ToolStatus::Succeeded => self.succeeded += 1,
            ToolStatus::Failed => self.failed += 1,
            ToolStatus::TimedOut => self.timed_out += 1,
            ToolStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.timed_out + self.cancelled
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} timed out, {} cancelled",
            self.succeeded, self.failed, self.timed_out, self.cancelled
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub state: RunState,
    pub targets: Vec<TargetRun>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Local::now(),
            ended_at: None,
            state: RunState::Running,
            targets: Vec::new(),
        }
    }

    pub fn record_target(&mut self, target: &str, results: Vec<ProcessResult>, state: TargetState) {
        self.targets.push(TargetRun {
            target: target.to_string(),
            state,
            results,
        });
    }

    /// Close the report with the final run state
    pub fn end(&mut self, state: RunState) {
        self.state = state;
        self.ended_at = Some(Local::now());
    }

    pub fn target(&self, target: &str) -> Option<&TargetRun> {
        self.targets.iter().find(|t| t.target == target)
    }

    pub fn results(&self) -> impl Iterator<Item = &ProcessResult> {
        self.targets.iter().flat_map(|t| t.results.iter())
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for result in self.results() {
            tally.add(result.status());
        }
        tally
    }

    pub fn log_summary(&self) {
        for run in &self.targets {
            let mut tally = Tally::default();
            for result in &run.results {
                tally.add(result.status());
            }
            log::info!("{} [{:?}]: {}", run.target, run.state, tally);
        }

        let elapsed = self
            .ended_at
            .unwrap_or_else(Local::now)
            .signed_duration_since(self.started_at);
        log::info!(
            "Run {} after {}s: {}",
            self.state,
            elapsed.num_seconds(),
            self.tally()
        );
    }
}

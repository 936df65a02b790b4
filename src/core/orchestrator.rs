//! Target orchestrator - per-target tool selection, targets in sequence

use super::context::{RunContext, RunEvent};
use super::runner::ProcessRunner;
use super::scheduler::WaveScheduler;
use super::tool::{Target, Tool};
use crate::error::RunError;
use crate::report::{RunReport, TargetState};
use std::time::Instant;

/// Tools that run for `target`: `(all ∩ include) \ exclude`, in config order
pub fn effective_tools(all: &[Tool], target: &Target) -> Vec<Tool> {
    all.iter()
        .filter(|tool| target.admits(&tool.name))
        .cloned()
        .collect()
}

/// Drives the wave scheduler over each target, one target at a time
pub struct TargetOrchestrator {
    scheduler: WaveScheduler,
}

impl TargetOrchestrator {
    pub fn new(runner: ProcessRunner, ctx: RunContext) -> Self {
        Self {
            scheduler: WaveScheduler::new(runner, ctx),
        }
    }

    pub fn context(&self) -> &RunContext {
        self.scheduler.context()
    }

    /// Run every target in order, recording results into `report`.
    ///
    /// Stops at the first interruption or fatal error; later targets are
    /// never started.
    pub async fn run(
        &self,
        tools: &[Tool],
        targets: &[Target],
        report: &mut RunReport,
    ) -> Result<(), RunError> {
        let ctx = self.context();

        for target in targets {
            if ctx.is_cancelled() {
                return Err(RunError::Interrupted);
            }

            let selected = effective_tools(tools, target);
            if selected.is_empty() {
                log::warn!("No tools selected for {}, skipping", target.value);
                report.record_target(&target.value, Vec::new(), TargetState::Skipped);
                continue;
            }

            log::info!("Starting run on {}", target.value);
            log::info!("====================================");
            ctx.emit(RunEvent::TargetStarted {
                target: target.value.clone(),
                at: Instant::now(),
            });

            let mut results = Vec::new();
            let outcome = self
                .scheduler
                .execute_waves(&selected, &target.value, &mut results)
                .await;

            ctx.emit(RunEvent::TargetFinished {
                target: target.value.clone(),
                at: Instant::now(),
            });

            match outcome {
                Ok(()) => {
                    log::info!("Completed run on {}", target.value);
                    log::info!("====================================");
                    report.record_target(&target.value, results, TargetState::Completed);
                }
                Err(err) => {
                    let state = if err.is_interrupted() {
                        log::warn!("Run on {} interrupted by user", target.value);
                        TargetState::Interrupted
                    } else {
                        TargetState::Aborted
                    };
                    report.record_target(&target.value, results, state);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}

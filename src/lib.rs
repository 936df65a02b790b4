//! waverunner - stage-ordered concurrent process runner
//!
//! Runs external command-line tools against a list of targets. Tools are
//! grouped into waves by their `map` key: a wave runs concurrently, waves run
//! in ascending key order, targets run one after another. Each tool gets its
//! own process group so timeouts and interrupts reach everything it spawned.

pub mod config;
pub mod core;
pub mod error;
pub mod report;

// Re-exports
pub use crate::config::RunConfig;
pub use crate::core::{
    CancellationController, ProcessResult, ProcessRunner, RunContext, RunEvent, Target,
    TargetOrchestrator, Tool, ToolStatus, WaveKey, WaveScheduler,
};
pub use crate::error::{ConfigError, RunError};
pub use crate::report::{RunReport, RunState, TargetState};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;

/// Engine - main entry point for library usage
pub struct WaveRunner {
    config: RunConfig,
    ctx: RunContext,
}

impl WaveRunner {
    pub fn new(config: RunConfig) -> Self {
        Self::with_context(config, RunContext::new())
    }

    /// Use a caller-provided context, e.g. one created with
    /// [`RunContext::with_events`]
    pub fn with_context(config: RunConfig, ctx: RunContext) -> Self {
        Self { config, ctx }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Install the SIGINT/SIGTERM handler for this run
    pub fn install_signal_handler(&self) -> std::io::Result<tokio::task::JoinHandle<()>> {
        CancellationController::new(self.ctx.clone(), self.config.settings.kill_grace).install()
    }

    /// Run every target; the report is returned even when the run stops early
    pub async fn run(&self) -> (RunReport, std::result::Result<(), RunError>) {
        let runner = ProcessRunner::new(self.config.settings.clone());
        let orchestrator = TargetOrchestrator::new(runner, self.ctx.clone());

        let mut report = RunReport::new();
        let outcome = orchestrator
            .run(&self.config.tools, &self.config.targets, &mut report)
            .await;

        let state = match &outcome {
            Ok(()) => RunState::Completed,
            Err(e) if e.is_interrupted() => RunState::Interrupted,
            Err(_) => RunState::Aborted,
        };
        report.end(state);
        (report, outcome)
    }
}

//! Core engine - templates, process groups, runner, waves, targets, cancellation

mod cancel;
mod context;
mod orchestrator;
pub mod process;
mod runner;
mod scheduler;
mod template;
mod tool;

pub use cancel::CancellationController;
pub use context::{RunContext, RunEvent};
pub use orchestrator::{effective_tools, TargetOrchestrator};
pub use process::{ProcessGroup, ProcessRegistry, Signal};
pub use runner::{
    ProcessResult, ProcessRunner, RunnerSettings, ToolStatus, DEFAULT_KILL_GRACE, DEFAULT_TIMEOUT,
};
pub use scheduler::{group_waves, Wave, WaveScheduler};
pub use template::{ArgTemplate, TemplateError, PLACEHOLDER};
pub use tool::{output_file_name, sanitize_target, Target, Tool, WaveKey};

//! Run context - cancellation state and event stream shared by every unit

use super::process::ProcessRegistry;
use super::runner::ProcessResult;
use super::tool::WaveKey;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Progress event emitted while a run executes
#[derive(Debug, Clone)]
pub enum RunEvent {
    TargetStarted {
        target: String,
        at: Instant,
    },
    TargetFinished {
        target: String,
        at: Instant,
    },
    WaveStarted {
        target: String,
        key: WaveKey,
        tools: Vec<String>,
        at: Instant,
    },
    WaveFinished {
        target: String,
        key: WaveKey,
        at: Instant,
    },
    ToolStarted {
        target: String,
        tool: String,
        pgid: i32,
        at: Instant,
    },
    ToolFinished {
        result: ProcessResult,
        at: Instant,
    },
}

/// Shared state of one run.
///
/// Cloning is cheap; clones observe the same cancellation token, process
/// registry and event channel.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    registry: ProcessRegistry,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context plus a receiver for its progress events
    pub fn with_events() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                events: Some(tx),
                ..Self::default()
            },
            rx,
        )
    }

    /// Context whose token is cancelled with this one, but can also be
    /// cancelled on its own without affecting the parent
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            registry: self.registry.clone(),
            events: self.events.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

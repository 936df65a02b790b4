//! Cancellation controller - turns SIGINT/SIGTERM into a run-wide stop
//!
//! The first signal cancels the run context, which makes every runner
//! terminate its own group and lets the scheduler unwind, and at the same
//! time sends SIGTERM to every registered process group directly. If the
//! run has not unwound within the grace period, or a second signal arrives,
//! the remaining groups are SIGKILLed and the process exits.

use super::context::RunContext;
use super::process::Signal;
use crate::error::INTERRUPTED_EXIT_CODE;
use std::io;
use std::time::Duration;
use tokio::signal::unix::{signal, Signal as OsSignal, SignalKind};
use tokio::task::JoinHandle;

/// Slack on top of the kill grace before the hard exit
const UNWIND_MARGIN: Duration = Duration::from_secs(2);

pub struct CancellationController {
    ctx: RunContext,
    grace: Duration,
}

impl CancellationController {
    pub fn new(ctx: RunContext, kill_grace: Duration) -> Self {
        Self {
            ctx,
            grace: kill_grace.saturating_add(UNWIND_MARGIN),
        }
    }

    /// Install the signal handlers and start watching.
    ///
    /// Must be called from within a tokio runtime, before any target runs.
    pub fn install(self) -> io::Result<JoinHandle<()>> {
        let interrupt = signal(SignalKind::interrupt())?;
        let terminate = signal(SignalKind::terminate())?;
        Ok(tokio::spawn(self.watch(interrupt, terminate)))
    }

    async fn watch(self, mut interrupt: OsSignal, mut terminate: OsSignal) {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }

        log::warn!("Interrupt received, terminating all processes...");
        self.stop();

        let forced = tokio::select! {
            _ = interrupt.recv() => true,
            _ = terminate.recv() => true,
            _ = tokio::time::sleep(self.grace) => false,
        };
        if forced {
            log::warn!("Second interrupt received, killing all processes");
        } else {
            log::warn!("Run did not stop within {:?}, killing all processes", self.grace);
        }

        self.ctx.registry().signal_all(Signal::Kill);
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }

    /// Cancel the run and SIGTERM every live process group
    pub fn stop(&self) -> usize {
        self.ctx.cancel();
        let signalled = self.ctx.registry().signal_all(Signal::Terminate);
        log::debug!("Sent SIGTERM to {} process groups", signalled);
        signalled
    }
}

//! Process groups - spawn children as group leaders and signal whole subtrees
//!
//! Every tool runs as the leader of a fresh process group, so one `killpg`
//! reaches the tool and any helpers it forked. The [`ProcessRegistry`] keeps
//! the ids of all live groups of a run for the interrupt path.

use std::collections::HashSet;
use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, ChildStderr, Command};

const SWEEP_POLL: Duration = Duration::from_millis(20);

/// Upper bound on waiting for stragglers, however long the kill grace is
const MAX_SWEEP_WAIT: Duration = Duration::from_secs(60);

/// Signals delivered to process groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
}

impl Signal {
    fn raw(self) -> libc::c_int {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}

/// Send `signal` to every process in group `pgid`.
///
/// A group that no longer exists is not an error.
pub fn signal_group(pgid: i32, signal: Signal) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal process group {}", pgid),
        ));
    }

    // SAFETY: killpg has no memory-safety preconditions.
    let rc = unsafe { libc::killpg(pgid, signal.raw()) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Whether any process, zombies included, still belongs to group `pgid`
pub fn group_exists(pgid: i32) -> bool {
    if pgid <= 0 {
        return false;
    }
    // SAFETY: signal 0 only performs the existence and permission check.
    unsafe { libc::killpg(pgid, 0) == 0 }
}

/// Live process groups of one run
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    groups: Arc<Mutex<HashSet<i32>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<i32>> {
        // The set stays consistent even if a holder panicked.
        self.groups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, pgid: i32) {
        self.lock().insert(pgid);
    }

    pub fn deregister(&self, pgid: i32) {
        self.lock().remove(&pgid);
    }

    pub fn contains(&self, pgid: i32) -> bool {
        self.lock().contains(&pgid)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Signal every registered group, returning how many were signalled
    pub fn signal_all(&self, signal: Signal) -> usize {
        let groups: Vec<i32> = self.lock().iter().copied().collect();
        let mut delivered = 0;
        for pgid in groups {
            match signal_group(pgid, signal) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Failed to signal process group {}: {}", pgid, e),
            }
        }
        delivered
    }
}

/// Handle over a spawned child that leads its own process group.
///
/// The group stays registered until the handle is dropped.
pub struct ProcessGroup {
    pgid: i32,
    child: Child,
    registry: ProcessRegistry,
}

impl ProcessGroup {
    /// Spawn `command` as the leader of a new process group
    pub fn spawn(mut command: Command, registry: &ProcessRegistry) -> io::Result<Self> {
        command.process_group(0);

        let mut child = command.spawn()?;
        let pgid = match child.id() {
            Some(pid) => pid as i32,
            None => {
                // Already reaped, which cannot happen before the first wait.
                let _ = child.start_kill();
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "spawned process has no pid",
                ));
            }
        };

        registry.register(pgid);
        log::debug!("Spawned process group {}", pgid);

        Ok(Self {
            pgid,
            child,
            registry: registry.clone(),
        })
    }

    /// Process group id (equal to the leader's pid)
    pub fn id(&self) -> i32 {
        self.pgid
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// SIGTERM to the whole group
    pub fn terminate(&self) -> io::Result<()> {
        signal_group(self.pgid, Signal::Terminate)
    }

    /// SIGKILL to the whole group
    pub fn kill(&self) -> io::Result<()> {
        signal_group(self.pgid, Signal::Kill)
    }

    /// Wait for the group leader to exit
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Terminate the group and reap the leader.
    ///
    /// Sends SIGTERM, waits up to `grace` for the leader, then SIGKILLs the
    /// group. The final SIGKILL is sent either way so that members which
    /// ignored SIGTERM do not survive the leader.
    pub async fn shutdown(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        if let Err(e) = self.terminate() {
            log::warn!("Failed to terminate process group {}: {}", self.pgid, e);
        }

        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                log::warn!(
                    "Process group {} still alive after {:?}, killing",
                    self.pgid,
                    grace
                );
                self.kill()?;
                self.child.wait().await
            }
        };

        if let Err(e) = self.kill() {
            log::debug!("Final sweep of process group {} failed: {}", self.pgid, e);
        }
        status
    }

    /// Clear out members left behind by a leader that already exited.
    ///
    /// Stragglers get SIGTERM, then SIGKILL once `grace` runs out. Must be
    /// called before the handle is dropped so the group stays reachable from
    /// the registry meanwhile.
    pub async fn sweep(&self, grace: Duration) {
        if !group_exists(self.pgid) {
            return;
        }
        log::debug!("Process group {} outlived its leader, terminating", self.pgid);
        if let Err(e) = self.terminate() {
            log::warn!("Failed to terminate process group {}: {}", self.pgid, e);
        }

        let deadline = tokio::time::Instant::now() + grace.min(MAX_SWEEP_WAIT);
        while group_exists(self.pgid) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(SWEEP_POLL).await;
        }

        if let Err(e) = self.kill() {
            log::debug!("Final sweep of process group {} failed: {}", self.pgid, e);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.registry.deregister(self.pgid);
    }
}

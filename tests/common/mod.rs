#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use waverunner::core::RunnerSettings;
use waverunner::{RunConfig, RunEvent, Target, Tool, WaveKey};

/// Scratch directory holding scripts, pid files and tool outputs
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a shell script; `$1` is the target, `$DIR` the sandbox
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join(format!("{}.sh", name));
        let text = format!("DIR='{}'\n{}\n", self.path().display(), body);
        std::fs::write(&path, text).unwrap();
        path
    }

    /// Tool running `sh <script> {target}`
    pub fn tool(&self, name: &str, map: impl Into<WaveKey>, body: &str) -> Tool {
        let script = self.script(name, body);
        Tool::new(
            name,
            map,
            "sh",
            &format!("{} {{target}}", script.display()),
            format!("{}.txt", name),
        )
        .unwrap()
    }

    pub fn settings(&self, timeout: Duration) -> RunnerSettings {
        RunnerSettings {
            timeout,
            kill_grace: Duration::from_millis(500),
            output_dir: self.path().to_path_buf(),
        }
    }

    pub fn config(&self, tools: Vec<Tool>, targets: &[&str]) -> RunConfig {
        RunConfig {
            tools,
            targets: targets.iter().map(|t| Target::new(*t)).collect(),
            settings: self.settings(Duration::from_secs(60)),
        }
    }

    pub fn read(&self, file: &str) -> Option<String> {
        std::fs::read_to_string(self.path().join(file)).ok()
    }

    pub fn read_pid(&self, file: &str) -> Option<i32> {
        self.read(file)?.trim().parse().ok()
    }

    /// Poll until `file` exists
    pub async fn wait_for_file(&self, file: &str, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if self.read(file).map(|s| !s.trim().is_empty()).unwrap_or(false) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

/// Whether `pid` is a live (non-zombie) process
pub fn is_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => {
            let state = stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next());
            !matches!(state, Some('Z') | Some('X') | None)
        }
        Err(_) if Path::new("/proc/self/stat").exists() => false,
        // SAFETY: signal 0 only checks for existence.
        Err(_) => unsafe { libc::kill(pid, 0) == 0 },
    }
}

/// Poll until `pid` is gone
pub async fn wait_until_dead(pid: i32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !is_alive(pid)
}

pub fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn started_at(events: &[RunEvent], target: &str, tool: &str) -> Option<Instant> {
    events.iter().find_map(|e| match e {
        RunEvent::ToolStarted {
            target: t,
            tool: name,
            at,
            ..
        } if t == target && name == tool => Some(*at),
        _ => None,
    })
}

pub fn finished_at(events: &[RunEvent], target: &str, tool: &str) -> Option<Instant> {
    events.iter().find_map(|e| match e {
        RunEvent::ToolFinished { result, at }
            if result.target == target && result.tool_name == tool =>
        {
            Some(*at)
        }
        _ => None,
    })
}

pub fn target_started(events: &[RunEvent], target: &str) -> bool {
    events
        .iter()
        .any(|e| matches!(e, RunEvent::TargetStarted { target: t, .. } if t == target))
}

//! Wave scheduler - ordered groups of tools run concurrently behind barriers

use super::context::{RunContext, RunEvent};
use super::runner::{ProcessResult, ProcessRunner};
use super::tool::{Tool, WaveKey};
use crate::error::RunError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Tools sharing one `map` key
#[derive(Debug, Clone)]
pub struct Wave {
    pub key: WaveKey,
    pub tools: Vec<Tool>,
}

impl Wave {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }
}

/// Group tools into waves, ascending by key, keeping config order inside a wave
pub fn group_waves(tools: &[Tool]) -> Vec<Wave> {
    let mut groups: BTreeMap<WaveKey, Vec<Tool>> = BTreeMap::new();
    for tool in tools {
        groups.entry(tool.map.clone()).or_default().push(tool.clone());
    }

    groups
        .into_iter()
        .map(|(key, tools)| Wave { key, tools })
        .collect()
}

/// Runs a target's tools wave by wave
pub struct WaveScheduler {
    runner: Arc<ProcessRunner>,
    ctx: RunContext,
}

impl WaveScheduler {
    pub fn new(runner: ProcessRunner, ctx: RunContext) -> Self {
        Self {
            runner: Arc::new(runner),
            ctx,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Execute every wave for `target`, appending each tool's result.
    ///
    /// A wave starts only after every unit of the previous wave has been
    /// joined. Tool failures and timeouts are logged and do not stop the
    /// run. A missing executable or a cancelled context stops it: the rest
    /// of the current wave is terminated and joined before returning.
    pub async fn execute_waves(
        &self,
        tools: &[Tool],
        target: &str,
        results: &mut Vec<ProcessResult>,
    ) -> Result<(), RunError> {
        for wave in group_waves(tools) {
            if self.ctx.is_cancelled() {
                return Err(RunError::Interrupted);
            }

            log::info!("Running group {} tools on {}", wave.key, target);
            self.ctx.emit(RunEvent::WaveStarted {
                target: target.to_string(),
                key: wave.key.clone(),
                tools: wave.tool_names(),
                at: Instant::now(),
            });

            let outcome = self.execute_wave(&wave, target, results).await;

            self.ctx.emit(RunEvent::WaveFinished {
                target: target.to_string(),
                key: wave.key.clone(),
                at: Instant::now(),
            });
            outcome?;
        }

        Ok(())
    }

    async fn execute_wave(
        &self,
        wave: &Wave,
        target: &str,
        results: &mut Vec<ProcessResult>,
    ) -> Result<(), RunError> {
        // Lets a fatal unit stop its siblings without cancelling the run.
        let wave_ctx = self.ctx.child();

        let mut units = JoinSet::new();
        for tool in &wave.tools {
            let runner = self.runner.clone();
            let ctx = wave_ctx.clone();
            let tool = tool.clone();
            let target = target.to_string();
            units.spawn(async move { runner.run(&tool, &target, &ctx).await });
        }

        let mut fatal: Option<RunError> = None;
        while let Some(joined) = units.join_next().await {
            let err = match joined {
                Ok(Ok(result)) => {
                    result.log();
                    results.push(result);
                    continue;
                }
                Ok(Err(err)) => err,
                Err(join_err) => RunError::Internal(format!("tool task failed: {}", join_err)),
            };

            if !err.is_interrupted() {
                log::error!("{}", err);
                wave_ctx.cancel();
            }
            // Keep the root cause over the interruptions it triggered.
            match &fatal {
                Some(existing) if !existing.is_interrupted() => {}
                _ => fatal = Some(err),
            }
        }

        if let Some(err) = fatal {
            return Err(err);
        }
        if self.ctx.is_cancelled() {
            return Err(RunError::Interrupted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, map: impl Into<WaveKey>) -> Tool {
        Tool::new(name, map, "true", "{target}", format!("{}.txt", name)).unwrap()
    }

    #[test]
    fn test_group_waves_orders_keys() {
        let tools = vec![
            tool("c", 3),
            tool("a1", 1),
            tool("b", 2),
            tool("a2", 1),
            tool("late", "zz"),
        ];

        let waves = group_waves(&tools);
        let keys: Vec<WaveKey> = waves.iter().map(|w| w.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                WaveKey::Int(1),
                WaveKey::Int(2),
                WaveKey::Int(3),
                WaveKey::Text("zz".into())
            ]
        );
        assert_eq!(waves[0].tool_names(), vec!["a1", "a2"]);
    }

    #[test]
    fn test_group_waves_sparse_keys() {
        let tools = vec![tool("x", 100), tool("y", 5)];
        let waves = group_waves(&tools);
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].key, WaveKey::Int(5));
        assert_eq!(waves[1].key, WaveKey::Int(100));
    }

    #[test]
    fn test_group_waves_empty() {
        assert!(group_waves(&[]).is_empty());
    }
}

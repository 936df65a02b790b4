//! Config loader - parses the YAML run file and validates it into core records

use crate::core::{RunnerSettings, Target, Tool, WaveKey, DEFAULT_KILL_GRACE, DEFAULT_TIMEOUT};
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env entries of this type are targets; anything else is ignored
pub const TARGET_ENTRY_TYPE: &str = "io";

/// Shown after a validation failure
pub const CONFIG_HELP: &str = "\
Configuration Help:
1. Ensure your YAML file has 'env' and 'tools' sections
2. Each tool must have: name, type, map, value, flags, output
3. Use {target} exactly once in the flags section to specify target placement
4. Maintain proper YAML indentation (2 spaces recommended)
5. Check for missing colons or incorrect data types
6. Use '#' for comments in the YAML file
7. Example valid configuration:

env:
  - name: prod networks
    type: io
    value: 127.0.0.1
    include: [nmap, nuclei]  # Optional: only run these tools
    exclude: [httpx]         # Optional: run all except these tools

tools:
  - name: nmap
    type: tool
    map: 1
    value: nmap
    flags: -sV -sC -oN nmap.txt {target}
    output: nmap.txt
    timeout: 1800            # Optional: seconds, overrides settings.timeout
";

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    env: Option<Vec<RawEnv>>,
    tools: Option<Vec<RawTool>>,
    #[serde(default)]
    settings: RawSettings,
}

#[derive(Debug, Deserialize)]
struct RawEnv {
    name: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    value: Option<String>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    name: Option<String>,
    #[serde(rename = "type")]
    tool_type: Option<String>,
    map: Option<WaveKey>,
    value: Option<String>,
    flags: Option<String>,
    output: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    timeout: Option<u64>,
    kill_grace: Option<u64>,
    output_dir: Option<PathBuf>,
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub tools: Vec<Tool>,
    pub targets: Vec<Target>,
    pub settings: RunnerSettings,
}

impl RunConfig {
    /// Load and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let env = raw.env.ok_or(ConfigError::MissingSection("env"))?;
        let raw_tools = raw.tools.ok_or(ConfigError::MissingSection("tools"))?;

        let mut targets = Vec::new();
        for (index, entry) in env.into_iter().enumerate() {
            if let Some(target) = validate_env(index, entry)? {
                targets.push(target);
            }
        }

        let mut tools = Vec::with_capacity(raw_tools.len());
        let mut seen = HashSet::new();
        for (index, raw_tool) in raw_tools.into_iter().enumerate() {
            let tool = validate_tool(index, raw_tool)?;
            if !seen.insert(tool.name.clone()) {
                log::warn!("Tool name '{}' is defined more than once", tool.name);
            }
            tools.push(tool);
        }

        let settings = validate_settings(raw.settings)?;

        Ok(Self {
            tools,
            targets,
            settings,
        })
    }

    /// Tool names referenced by include/exclude lists but not defined
    pub fn unknown_tool_references(&self) -> Vec<String> {
        let known: HashSet<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        let mut unknown: Vec<String> = self
            .targets
            .iter()
            .flat_map(|t| t.include.iter().chain(t.exclude.iter()).flatten())
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        unknown.sort();
        unknown
    }
}

fn validate_env(index: usize, entry: RawEnv) -> Result<Option<Target>, ConfigError> {
    let invalid = |field: &'static str| ConfigError::InvalidEnv { index, field };

    let name = entry.name.ok_or_else(|| invalid("name"))?;
    let entry_type = entry.entry_type.ok_or_else(|| invalid("type"))?;
    let value = entry.value.ok_or_else(|| invalid("value"))?;

    if entry_type != TARGET_ENTRY_TYPE {
        log::debug!("Ignoring env entry '{}' of type '{}'", name, entry_type);
        return Ok(None);
    }

    Ok(Some(Target {
        name: Some(name),
        value,
        include: entry.include.map(|names| names.into_iter().collect()),
        exclude: entry.exclude.map(|names| names.into_iter().collect()),
    }))
}

fn validate_tool(index: usize, raw: RawTool) -> Result<Tool, ConfigError> {
    let label = raw
        .name
        .clone()
        .unwrap_or_else(|| format!("unnamed #{}", index));
    let missing = |field: &'static str| ConfigError::MissingField {
        tool: label.clone(),
        field,
    };

    let name = raw.name.ok_or_else(|| missing("name"))?;
    raw.tool_type.ok_or_else(|| missing("type"))?;
    let map = raw.map.ok_or_else(|| missing("map"))?;
    let command = raw.value.ok_or_else(|| missing("value"))?;
    let flags = raw.flags.ok_or_else(|| missing("flags"))?;
    let output = raw.output.ok_or_else(|| missing("output"))?;

    let mut tool = Tool::new(name, map, command, &flags, output).map_err(|source| {
        ConfigError::Template {
            tool: label.clone(),
            source,
        }
    })?;

    if let Some(secs) = raw.timeout {
        if secs == 0 {
            return Err(ConfigError::InvalidTimeout { tool: label });
        }
        tool = tool.with_timeout(Duration::from_secs(secs));
    }

    Ok(tool)
}

fn validate_settings(raw: RawSettings) -> Result<RunnerSettings, ConfigError> {
    let timeout = match raw.timeout {
        Some(0) => return Err(ConfigError::InvalidSetting("timeout")),
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_TIMEOUT,
    };
    let kill_grace = match raw.kill_grace {
        Some(0) => return Err(ConfigError::InvalidSetting("kill_grace")),
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_KILL_GRACE,
    };

    Ok(RunnerSettings {
        timeout,
        kill_grace,
        output_dir: raw.output_dir.unwrap_or_else(|| PathBuf::from(".")),
    })
}

//! Tool and target records handed to the core by the config loader

use super::template::{ArgTemplate, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wave key - the `map` value tools are grouped and ordered by.
///
/// Keys may be sparse. Integers order numerically and sort before text keys,
/// text keys order lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WaveKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for WaveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for WaveKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for WaveKey {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<&str> for WaveKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// An external command-line tool
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub map: WaveKey,
    /// Executable, looked up on `PATH` unless it contains a slash
    pub command: String,
    pub args: ArgTemplate,
    pub output_suffix: String,
    /// Overrides the run-wide timeout when set
    pub timeout: Option<Duration>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        map: impl Into<WaveKey>,
        command: impl Into<String>,
        flags: &str,
        output_suffix: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            name: name.into(),
            map: map.into(),
            command: command.into(),
            args: ArgTemplate::parse(flags)?,
            output_suffix: output_suffix.into(),
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Where this tool's stdout lands for `target`
    pub fn output_path(&self, output_dir: &Path, target: &str) -> PathBuf {
        output_dir.join(output_file_name(target, &self.output_suffix))
    }

    /// Human-readable command line for `target`
    pub fn command_line(&self, target: &str) -> String {
        std::iter::once(self.command.clone())
            .chain(self.args.render(target))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Replace path separators so a target is usable as one path component
pub fn sanitize_target(target: &str) -> String {
    target.replace(['/', '\\'], "_")
}

/// `sanitize(target) + "_" + suffix`
pub fn output_file_name(target: &str, suffix: &str) -> String {
    format!("{}_{}", sanitize_target(target), suffix)
}

/// Subject every selected tool runs against (host, network, URL...)
#[derive(Debug, Clone, Default)]
pub struct Target {
    /// Descriptive label from the config, not used for execution
    pub name: Option<String>,
    pub value: String,
    pub include: Option<HashSet<String>>,
    pub exclude: Option<HashSet<String>>,
}

impl Target {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Include filter first, exclude filter second
    pub fn admits(&self, tool_name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.contains(tool_name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.contains(tool_name) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wave_key_ordering() {
        let mut keys = vec![
            WaveKey::from("recon"),
            WaveKey::from(10),
            WaveKey::from("exploit"),
            WaveKey::from(-1),
            WaveKey::from(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                WaveKey::Int(-1),
                WaveKey::Int(2),
                WaveKey::Int(10),
                WaveKey::Text("exploit".into()),
                WaveKey::Text("recon".into()),
            ]
        );
    }

    #[test]
    fn test_wave_key_deserialize() {
        let key: WaveKey = serde_yaml::from_str("3").unwrap();
        assert_eq!(key, WaveKey::Int(3));
        let key: WaveKey = serde_yaml::from_str("late").unwrap();
        assert_eq!(key, WaveKey::Text("late".into()));
    }

    #[test]
    fn test_output_path_sanitizes_target() {
        let tool = Tool::new("nmap", 1, "nmap", "{target}", "nmap.txt").unwrap();
        assert_eq!(
            tool.output_path(Path::new("out"), "10.0.0.0/24"),
            PathBuf::from("out/10.0.0.0_24_nmap.txt")
        );
        assert_eq!(output_file_name("a\\b/c", "x.txt"), "a_b_c_x.txt");
    }

    #[test]
    fn test_command_line() {
        let tool = Tool::new("httpx", 2, "httpx", "-u {target} -silent", "httpx.txt").unwrap();
        assert_eq!(tool.command_line("example.com"), "httpx -u example.com -silent");
    }

    #[test]
    fn test_target_admits() {
        let target = Target::new("10.0.0.1")
            .with_include(["nmap", "nuclei"])
            .with_exclude(["nuclei"]);
        assert!(target.admits("nmap"));
        assert!(!target.admits("nuclei"));
        assert!(!target.admits("httpx"));

        let open = Target::new("10.0.0.1");
        assert!(open.admits("anything"));
    }
}

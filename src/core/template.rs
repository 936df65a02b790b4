//! Argument templates - validated once, substituted many times

use std::fmt;
use thiserror::Error;

/// Placeholder replaced by the target value
pub const PLACEHOLDER: &str = "{target}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("missing {{target}} placeholder")]
    MissingPlaceholder,
    #[error("{{target}} placeholder appears {0} times, expected exactly once")]
    DuplicatePlaceholder(usize),
}

/// Whitespace-separated argument list holding exactly one `{target}` slot.
///
/// The slot may be a whole argument (`{target}`) or embedded in one
/// (`--url=http://{target}/`). Rendering is a pure function of the target:
/// the target is inserted verbatim, so a target that itself contains
/// `{target}` or whitespace is never re-expanded or split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTemplate {
    before: Vec<String>,
    prefix: String,
    suffix: String,
    after: Vec<String>,
}

impl ArgTemplate {
    /// Parse a flags string such as `-sV -oN out.txt {target}`
    pub fn parse(flags: &str) -> Result<Self, TemplateError> {
        let tokens: Vec<&str> = flags.split_whitespace().collect();

        let count: usize = tokens.iter().map(|t| t.matches(PLACEHOLDER).count()).sum();
        match count {
            0 => return Err(TemplateError::MissingPlaceholder),
            1 => {}
            n => return Err(TemplateError::DuplicatePlaceholder(n)),
        }

        let slot = tokens
            .iter()
            .position(|t| t.contains(PLACEHOLDER))
            .ok_or(TemplateError::MissingPlaceholder)?;
        let (prefix, suffix) = tokens[slot]
            .split_once(PLACEHOLDER)
            .ok_or(TemplateError::MissingPlaceholder)?;

        Ok(Self {
            before: tokens[..slot].iter().map(|t| t.to_string()).collect(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            after: tokens[slot + 1..].iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Build the argument vector for one target
    pub fn render(&self, target: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.before.len() + self.after.len() + 1);
        args.extend(self.before.iter().cloned());
        args.push(format!("{}{}{}", self.prefix, target, self.suffix));
        args.extend(self.after.iter().cloned());
        args
    }
}

impl fmt::Display for ArgTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = format!("{}{}{}", self.prefix, PLACEHOLDER, self.suffix);
        let parts: Vec<&str> = self
            .before
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(slot.as_str()))
            .chain(self.after.iter().map(String::as_str))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

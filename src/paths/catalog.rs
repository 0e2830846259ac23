// src/paths/catalog.rs

use std::collections::BTreeMap;

use crate::errors::ConfigurationError;
use crate::paths::pathset::PathSet;

/// Placeholder substituted with the staging root in patterns and destinations.
pub const STAGE_PLACEHOLDER: &str = "{stage}";

/// The named path sets from `[paths]`, plus the staging root.
///
/// Pattern lists elsewhere in the config may reference a named set with
/// `@name`; the reference expands inline, in place, to that set's patterns.
#[derive(Debug, Clone, Default)]
pub struct PathCatalog {
    stage: String,
    sets: BTreeMap<String, Vec<String>>,
}

impl PathCatalog {
    pub fn new(stage: impl Into<String>, sets: BTreeMap<String, Vec<String>>) -> Self {
        let stage = stage.into();
        let stage = stage.trim_end_matches('/').to_string();
        Self { stage, sets }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(|s| s.as_str())
    }

    /// Substitute `{stage}` in a single string.
    pub fn substitute(&self, value: &str) -> String {
        value.replace(STAGE_PLACEHOLDER, &self.stage)
    }

    /// Fully expanded [`PathSet`] for a named entry of `[paths]`.
    pub fn named(&self, name: &str) -> Result<PathSet, ConfigurationError> {
        let patterns = self.sets.get(name).ok_or_else(|| ConfigurationError::MalformedPathSet {
            name: name.to_string(),
            reason: "no such entry in [paths]".to_string(),
        })?;
        let mut out = Vec::new();
        let mut chain = vec![name.to_string()];
        self.expand_into(name, patterns, &mut chain, &mut out)?;
        Ok(PathSet::new(name, out))
    }

    /// Expand `@name` references and `{stage}` in a pattern list.
    ///
    /// `owner` labels the list in error messages. It is not a `[paths]` entry,
    /// so a watch group called `js` may reference `@js`.
    pub fn expand(&self, owner: &str, patterns: &[String]) -> Result<Vec<String>, ConfigurationError> {
        let mut out = Vec::new();
        self.expand_into(owner, patterns, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    fn expand_into(
        &self,
        owner: &str,
        patterns: &[String],
        chain: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), ConfigurationError> {
        for pattern in patterns {
            let trimmed = pattern.trim();
            let Some(reference) = trimmed.strip_prefix('@') else {
                out.push(self.substitute(trimmed));
                continue;
            };

            if chain.iter().any(|c| c == reference) {
                let mut cycle = chain.clone();
                cycle.push(reference.to_string());
                return Err(ConfigurationError::MalformedPathSet {
                    name: owner.to_string(),
                    reason: format!("circular reference {}", cycle.join(" -> @")),
                });
            }

            let nested = self.sets.get(reference).ok_or_else(|| {
                ConfigurationError::MalformedPathSet {
                    name: owner.to_string(),
                    reason: format!("unknown path set reference '@{reference}'"),
                }
            })?;

            chain.push(reference.to_string());
            self.expand_into(owner, nested, chain, out)?;
            chain.pop();
        }
        Ok(())
    }
}

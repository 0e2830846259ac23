// src/paths/pathset.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::errors::ConfigurationError;
use crate::fs::{walk_files, FileSystem};
use crate::paths::path_utils::{glob_base, relative_str};

/// A named, ordered collection of glob patterns.
///
/// Patterns are relative to the project root. A leading `!` turns a pattern
/// into an exclusion that applies to the whole set, regardless of position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    pub name: String,
    pub patterns: Vec<String>,
}

impl PathSet {
    pub fn new(name: impl Into<String>, patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            patterns,
        }
    }

    pub fn compile(&self) -> std::result::Result<CompiledPathSet, ConfigurationError> {
        CompiledPathSet::compile(&self.name, &self.patterns)
    }
}

#[derive(Clone)]
struct Include {
    pattern: String,
    matcher: GlobMatcher,
    base: PathBuf,
}

/// A [`PathSet`] with its globs compiled, ready to match or resolve.
///
/// Resolution order is part of the contract, since bundling concatenates in
/// this order:
/// 1. include patterns are visited in declaration order;
/// 2. matches of a single pattern are sorted by relative path;
/// 3. a file matched by an earlier pattern keeps its first position.
#[derive(Clone)]
pub struct CompiledPathSet {
    name: String,
    includes: Vec<Include>,
    excludes: Option<GlobSet>,
}

impl fmt::Debug for CompiledPathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<&str> = self.includes.iter().map(|i| i.pattern.as_str()).collect();
        f.debug_struct("CompiledPathSet")
            .field("name", &self.name)
            .field("includes", &patterns)
            .finish_non_exhaustive()
    }
}

fn build_glob(pattern: &str) -> std::result::Result<globset::Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
}

fn normalize(pattern: &str) -> &str {
    pattern.trim().trim_start_matches("./")
}

impl CompiledPathSet {
    pub fn compile(
        name: &str,
        patterns: &[String],
    ) -> std::result::Result<Self, ConfigurationError> {
        let malformed = |reason: String| ConfigurationError::MalformedPathSet {
            name: name.to_string(),
            reason,
        };

        let mut includes = Vec::new();
        let mut exclude_builder = GlobSetBuilder::new();
        let mut has_excludes = false;

        for raw in patterns {
            let trimmed = raw.trim();
            if let Some(negated) = trimmed.strip_prefix('!') {
                let pat = normalize(negated);
                if pat.is_empty() {
                    return Err(malformed("empty exclusion pattern".to_string()));
                }
                let glob = build_glob(pat)
                    .map_err(|e| malformed(format!("invalid glob '{raw}': {e}")))?;
                exclude_builder.add(glob);
                has_excludes = true;
            } else {
                let pat = normalize(trimmed);
                if pat.is_empty() {
                    return Err(malformed("empty pattern".to_string()));
                }
                if pat.starts_with('/') || pat.split('/').any(|seg| seg == "..") {
                    return Err(malformed(format!(
                        "pattern '{raw}' must stay inside the project root"
                    )));
                }
                let glob = build_glob(pat)
                    .map_err(|e| malformed(format!("invalid glob '{raw}': {e}")))?;
                includes.push(Include {
                    pattern: pat.to_string(),
                    matcher: glob.compile_matcher(),
                    base: glob_base(pat),
                });
            }
        }

        let excludes = if has_excludes {
            Some(
                exclude_builder
                    .build()
                    .map_err(|e| malformed(format!("building exclusions: {e}")))?,
            )
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            includes,
            excludes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Whether a root-relative, `/`-separated path belongs to this set.
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(rel_path) {
                return false;
            }
        }
        self.includes.iter().any(|i| i.matcher.is_match(rel_path))
    }

    /// Literal directories (relative to the root) that contain every file this
    /// set can match, de-duplicated, in pattern order. Used to scope watchers.
    pub fn base_dirs(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.includes
            .iter()
            .filter(|i| seen.insert(i.base.clone()))
            .map(|i| i.base.clone())
            .collect()
    }

    /// Resolve the set against `root` into a concrete, ordered file list.
    ///
    /// Returned paths are `root.join(relative)`. Missing base directories
    /// simply contribute no files.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
        let mut listings: HashMap<PathBuf, Vec<(String, PathBuf)>> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut resolved = Vec::new();

        for include in &self.includes {
            if !listings.contains_key(&include.base) {
                let dir = root.join(&include.base);
                let mut entries: Vec<(String, PathBuf)> = walk_files(fs, &dir)?
                    .into_iter()
                    .filter_map(|path| relative_str(root, &path).map(|rel| (rel, path)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                listings.insert(include.base.clone(), entries);
            }

            let Some(entries) = listings.get(&include.base) else {
                continue;
            };

            for (rel, path) in entries {
                if !include.matcher.is_match(rel) {
                    continue;
                }
                if let Some(excludes) = &self.excludes {
                    if excludes.is_match(rel) {
                        continue;
                    }
                }
                if seen.insert(rel.clone()) {
                    resolved.push(path.clone());
                }
            }
        }

        debug!(pathset = %self.name, files = resolved.len(), "resolved path set");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn set(patterns: &[&str]) -> CompiledPathSet {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        CompiledPathSet::compile("test", &patterns).unwrap()
    }

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("proj/client/app/app.module.js", "m");
        fs.add_file("proj/client/app/core/core.module.js", "cm");
        fs.add_file("proj/client/app/core/dataservice.js", "ds");
        fs.add_file("proj/client/app/avengers/avengers.js", "av");
        fs.add_file("proj/client/app/avengers/avengers.spec.js", "spec");
        fs.add_file("proj/client/content/app.css", "css");
        fs
    }

    #[test]
    fn declaration_order_wins_over_alphabetical_order() {
        let fs = project();
        let files = set(&["client/app/**/*.module.js", "client/app/**/*.js", "!**/*.spec.js"])
            .resolve(&fs, Path::new("proj"))
            .unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("proj/client/app/app.module.js"),
                PathBuf::from("proj/client/app/core/core.module.js"),
                PathBuf::from("proj/client/app/avengers/avengers.js"),
                PathBuf::from("proj/client/app/core/dataservice.js"),
            ]
        );
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let fs = project();
        let files = set(&["client/app/*.js"]).resolve(&fs, Path::new("proj")).unwrap();
        assert_eq!(files, vec![PathBuf::from("proj/client/app/app.module.js")]);
    }

    #[test]
    fn literal_pattern_resolves_single_file_and_missing_dirs_are_empty() {
        let fs = project();
        let files = set(&["client/content/app.css", "vendor/**/*.css"])
            .resolve(&fs, Path::new("proj"))
            .unwrap();
        assert_eq!(files, vec![PathBuf::from("proj/client/content/app.css")]);
    }

    #[test]
    fn matches_honours_exclusions() {
        let s = set(&["client/**/*.js", "!client/**/*.spec.js"]);
        assert!(s.matches("client/app/a.js"));
        assert!(!s.matches("client/app/a.spec.js"));
        assert!(!s.matches("server/a.js"));
    }

    #[test]
    fn base_dirs_are_deduplicated() {
        let s = set(&["client/app/**/*.js", "client/app/**/*.html", "Assetdag.toml"]);
        assert_eq!(s.base_dirs(), vec![PathBuf::from("client/app"), PathBuf::new()]);
    }

    #[test]
    fn malformed_patterns_are_configuration_errors() {
        let err = CompiledPathSet::compile("bad", &["client/[".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigurationError::MalformedPathSet { ref name, .. } if name == "bad"));

        let err = CompiledPathSet::compile("up", &["../secrets/*".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigurationError::MalformedPathSet { .. }));
    }
}

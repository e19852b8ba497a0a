// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::model::{FileWatch, Name};

/// Compiled path/ignore globs for one `FileWatch`.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths such as `"src/main.rs"` into [`FileWatchProfile::matches`].
#[derive(Clone)]
pub struct FileWatchProfile {
    name: Name,
    watch_set: GlobSet,
    ignore_set: Option<GlobSet>,
}

impl fmt::Debug for FileWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWatchProfile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FileWatchProfile {
    pub fn new(fw: &FileWatch) -> Result<Self> {
        let watch_set = build_globset(&fw.paths)
            .with_context(|| format!("building path globs for file watch {}", fw.name))?;

        let ignore_set = if fw.ignore.is_empty() {
            None
        } else {
            Some(
                build_globset(&fw.ignore)
                    .with_context(|| format!("building ignore globs for file watch {}", fw.name))?,
            )
        };

        Ok(Self {
            name: fw.name.clone(),
            watch_set,
            ignore_set,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(ignore) = &self.ignore_set {
            if ignore.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

pub fn build_profiles<'a>(
    watches: impl IntoIterator<Item = &'a FileWatch>,
) -> Result<Vec<FileWatchProfile>> {
    watches.into_iter().map(FileWatchProfile::new).collect()
}

/// Names of the watches interested in `rel_path`, in profile order.
pub fn matching_watches<'a>(profiles: &'a [FileWatchProfile], rel_path: &str) -> Vec<&'a str> {
    profiles
        .iter()
        .filter(|p| p.matches(rel_path))
        .map(FileWatchProfile::name)
        .collect()
}

/// A plain path (no glob metacharacters) also covers everything below it.
fn expand_pattern(pattern: &str) -> Vec<String> {
    let trimmed = pattern.trim_end_matches('/');
    if trimmed.contains(['*', '?', '[', '{']) {
        return vec![trimmed.to_string()];
    }
    let trimmed = trimmed.trim_start_matches("./");
    if trimmed.is_empty() || trimmed == "." {
        return vec!["**".to_string()];
    }
    vec![trimmed.to_string(), format!("{trimmed}/**")]
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns.iter().flat_map(|p| expand_pattern(p)) {
        let glob = Glob::new(&pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

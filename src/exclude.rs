//! Glob-based exclusion matching.
//!
//! A pattern excludes a path when it matches the bare file name, the full
//! path relative to the source folder, or any single path component. A
//! matched directory excludes its entire subtree; the scanner prunes there
//! instead of descending.

use glob::Pattern;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    patterns: Vec<Pattern>,
}

impl ExcludeMatcher {
    /// Compile the configured glob strings. Invalid patterns are skipped
    /// with a warning rather than failing the whole run.
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Invalid exclude pattern '{}': {}", raw, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Check a path relative to its source folder against all patterns.
    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let rel_str = relative_path.to_string_lossy();
        let name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        for pattern in &self.patterns {
            if pattern.matches(&name) || pattern.matches(&rel_str) {
                return true;
            }
            for component in relative_path.components() {
                if pattern.matches(&component.as_os_str().to_string_lossy()) {
                    return true;
                }
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn matcher(patterns: &[&str]) -> ExcludeMatcher {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        ExcludeMatcher::new(&patterns)
    }

    #[test]
    fn test_match_by_file_name() {
        let m = matcher(&["*.tmp", "Thumbs.db"]);
        assert!(m.is_excluded(&PathBuf::from("notes/draft.tmp")));
        assert!(m.is_excluded(&PathBuf::from("photos/2024/Thumbs.db")));
        assert!(!m.is_excluded(&PathBuf::from("notes/draft.txt")));
    }

    #[test]
    fn test_match_by_relative_path() {
        let m = matcher(&["build/out*"]);
        assert!(m.is_excluded(&PathBuf::from("build/out.bin")));
        assert!(!m.is_excluded(&PathBuf::from("src/out.bin")));
    }

    #[test]
    fn test_match_by_path_segment() {
        let m = matcher(&["node_modules", "__pycache__"]);
        assert!(m.is_excluded(&PathBuf::from("app/node_modules")));
        assert!(m.is_excluded(&PathBuf::from("app/node_modules/react/index.js")));
        assert!(m.is_excluded(&PathBuf::from("lib/__pycache__/mod.pyc")));
        assert!(!m.is_excluded(&PathBuf::from("app/modules/react/index.js")));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let m = matcher(&["[", "*.log"]);
        assert!(m.is_excluded(&PathBuf::from("run.log")));
        assert!(!m.is_excluded(&PathBuf::from("run.txt")));
    }

    #[test]
    fn test_empty_matcher_excludes_nothing() {
        let m = matcher(&[]);
        assert!(m.is_empty());
        assert!(!m.is_excluded(&PathBuf::from("anything/at/all")));
    }
}

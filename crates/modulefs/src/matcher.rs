//! Path matchers.
//!
//! `glob:` patterns compile through `globset` with `*` and `?` stopping at
//! `/`; `regex:` patterns are used as written, anchored at both ends. Both
//! match the backend path string.

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::error::{ModuleFsError, ModuleFsResult};
use crate::path::ModulePath;

#[derive(Debug, Clone)]
enum Compiled {
    Glob(GlobMatcher),
    Regex(Regex),
}

/// A compiled `glob:` or `regex:` matcher.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    compiled: Compiled,
}

impl PathMatcher {
    /// Compile `syntax:pattern`, where syntax is `glob` or `regex`.
    pub fn new(syntax_and_pattern: &str) -> ModuleFsResult<Self> {
        let (syntax, pattern) = syntax_and_pattern.split_once(':').ok_or_else(|| {
            ModuleFsError::InvalidPattern(format!("{syntax_and_pattern}: missing syntax"))
        })?;

        let compiled = match syntax.to_ascii_lowercase().as_str() {
            "glob" => {
                let glob = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| ModuleFsError::InvalidPattern(e.to_string()))?;
                Compiled::Glob(glob.compile_matcher())
            }
            "regex" => {
                let regex = Regex::new(&format!("^(?:{pattern})$"))
                    .map_err(|e| ModuleFsError::InvalidPattern(format!("{pattern}: {e}")))?;
                Compiled::Regex(regex)
            }
            other => {
                return Err(ModuleFsError::InvalidPattern(format!(
                    "syntax {other} is not supported"
                )));
            }
        };
        Ok(Self { compiled })
    }

    pub fn matches(&self, path: &ModulePath) -> bool {
        self.matches_path(path.backend_path())
    }

    pub fn matches_path(&self, path: &Path) -> bool {
        match &self.compiled {
            Compiled::Glob(glob) => glob.is_match(path),
            Compiled::Regex(regex) => regex.is_match(&path.to_string_lossy()),
        }
    }
}

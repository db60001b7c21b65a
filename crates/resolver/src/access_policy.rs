use std::path::{Path, PathBuf};

use syntax::{Error, Result};

/// The composition of flags determining whether a resolved include target
/// is permitted to be parsed. `SameDirectory` and `Subdirectories` are
/// enabled by default; the remaining flags default to off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    same_directory: bool,
    subdirectories: bool,
    any_directory: bool,
    require_suffix: bool,
    only_file_sources: bool,
}

impl AccessPolicy {
    pub const CANONICAL_SUFFIX: &'static str = "elcl";

    pub const fn new() -> Self {
        Self { same_directory: true, subdirectories: true, any_directory: false, require_suffix: false, only_file_sources: false }
    }

    pub fn with_same_directory(mut self, value: bool) -> Self {
        self.same_directory = value;
        self
    }

    pub fn with_subdirectories(mut self, value: bool) -> Self {
        self.subdirectories = value;
        self
    }

    pub fn with_any_directory(mut self, value: bool) -> Self {
        self.any_directory = value;
        self
    }

    pub fn with_require_suffix(mut self, value: bool) -> Self {
        self.require_suffix = value;
        self
    }

    pub fn with_only_file_sources(mut self, value: bool) -> Self {
        self.only_file_sources = value;
        self
    }

    pub fn only_file_sources(&self) -> bool {
        self.only_file_sources
    }

    /// Check a single resolved candidate against the policy. `including_dir`
    /// is the directory the `@include` line itself lives in.
    pub fn check(&self, including_dir: &Path, candidate: &Path) -> Result<()> {
        if self.require_suffix && candidate.extension().and_then(|e| e.to_str()) != Some(Self::CANONICAL_SUFFIX) {
            return Err(Error::access(format!("'{}' does not have the required '.{}' suffix", candidate.display(), Self::CANONICAL_SUFFIX)));
        }

        if self.any_directory {
            return Ok(());
        }

        let including_dir = canonical_or_self(including_dir);
        let candidate_dir = candidate.parent().map(canonical_or_self).unwrap_or_default();

        if self.same_directory && candidate_dir == including_dir {
            return Ok(());
        }
        if self.subdirectories && candidate_dir.starts_with(&including_dir) {
            return Ok(());
        }
        Err(Error::access(format!("'{}' is outside the directories permitted by the access policy", candidate.display())))
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_same_and_sub_directories_only() {
        let policy = AccessPolicy::default();
        assert!(policy.check(Path::new("/a"), Path::new("/a/b.elcl")).is_ok());
        assert!(policy.check(Path::new("/a"), Path::new("/a/sub/b.elcl")).is_ok());
        assert!(policy.check(Path::new("/a"), Path::new("/other/b.elcl")).is_err());
    }

    #[test]
    fn require_suffix_checks_extension() {
        let policy = AccessPolicy::default().with_require_suffix(true);
        assert!(policy.check(Path::new("/a"), Path::new("/a/b.elcl")).is_ok());
        assert!(policy.check(Path::new("/a"), Path::new("/a/b.txt")).is_err());
    }
}

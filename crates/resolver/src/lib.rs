//! Resolves the text literal of an `@include` directive to zero or more
//! file sources, and enforces the access policy each resolved source must
//! satisfy before it is allowed to be parsed.

mod access_policy;
mod glob;

use std::path::{Path, PathBuf};

use syntax::{Error, Result, SourceIdentifier};

pub use access_policy::AccessPolicy;

/// A single resolved include target, always a canonical, absolute file path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedSource {
    pub path: PathBuf,
}

/// Everything a [`SourceResolver`] needs to resolve one `@include` literal.
pub struct SourceResolverContext<'a> {
    /// The raw text carried by the `@include` literal, unescaped.
    pub include_text: &'a str,
    /// The identifier of the source the `@include` line was read from,
    /// used to resolve relative paths and enforce directory-scoped access.
    pub source_identifier: &'a SourceIdentifier,
}

/// Resolves an include literal to a list of sources. Applications may supply
/// their own implementation (falling back to [`FileSourceResolver`] for
/// anything they don't special-case) by wiring it into
/// `parser::ParserSettings`.
pub trait SourceResolver {
    fn resolve(&self, context: &SourceResolverContext<'_>) -> Result<Vec<ResolvedSource>>;
}

/// The default resolver: resolves `@include` literals against the file
/// system, honouring the `*`/`**` wildcard grammar and applying an
/// [`AccessPolicy`] to every match.
pub struct FileSourceResolver {
    access_policy: AccessPolicy,
}

impl FileSourceResolver {
    pub fn new(access_policy: AccessPolicy) -> Self {
        Self { access_policy }
    }

    pub fn access_policy(&self) -> &AccessPolicy {
        &self.access_policy
    }
}

impl Default for FileSourceResolver {
    fn default() -> Self {
        Self::new(AccessPolicy::default())
    }
}

impl SourceResolver for FileSourceResolver {
    fn resolve(&self, context: &SourceResolverContext<'_>) -> Result<Vec<ResolvedSource>> {
        if self.access_policy.only_file_sources() && !context.source_identifier.is_file() {
            return Err(Error::access("includes are not permitted from a non-file source under the configured access policy"));
        }
        let including_dir = including_directory(context.source_identifier)?;
        let include_path = glob::IncludePath::parse(context.include_text)?;
        let mut matches = glob::resolve(&including_dir, &include_path)?;

        if matches.is_empty() && !include_path.has_wildcard() {
            return Err(Error::syntax(format!("could not find the include source '{}'", context.include_text)));
        }

        matches.sort();
        matches.dedup();

        for candidate in &matches {
            self.access_policy.check(&including_dir, candidate)?;
        }

        Ok(matches.into_iter().map(|path| ResolvedSource { path }).collect())
    }
}

fn including_directory(source_identifier: &SourceIdentifier) -> Result<PathBuf> {
    match source_identifier.path() {
        Some(path) => Ok(parent_directory(path)),
        None => Err(Error::access("relative includes require a file source to resolve against")),
    }
}

fn parent_directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use syntax::ErrorCategory;

    use super::*;

    fn write_file(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "[main]\nvalue: 1\n").unwrap();
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("elcl-resolver-test-{:?}-{}", std::thread::current().id(), std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolves_a_plain_relative_file() {
        let dir = tempdir();
        write_file(&dir, "main.elcl");
        write_file(&dir, "a.elcl");
        let including = SourceIdentifier::file(dir.join("main.elcl"));
        let resolver = FileSourceResolver::default();
        let result = resolver.resolve(&SourceResolverContext { include_text: "a.elcl", source_identifier: &including }).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, fs::canonicalize(dir.join("a.elcl")).unwrap());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn non_wildcard_include_matching_nothing_is_syntax_error() {
        let dir = tempdir();
        write_file(&dir, "main.elcl");
        let including = SourceIdentifier::file(dir.join("main.elcl"));
        let resolver = FileSourceResolver::default();
        let err = resolver.resolve(&SourceResolverContext { include_text: "missing.elcl", source_identifier: &including }).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert!(err.message().contains("not find"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn wildcard_include_matching_nothing_is_not_an_error() {
        let dir = tempdir();
        write_file(&dir, "main.elcl");
        let including = SourceIdentifier::file(dir.join("main.elcl"));
        let resolver = FileSourceResolver::default();
        let result = resolver.resolve(&SourceResolverContext { include_text: "conf.d/*.elcl", source_identifier: &including }).unwrap();
        assert!(result.is_empty());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn wildcard_star_matches_multiple_files_in_order() {
        let dir = tempdir();
        write_file(&dir, "main.elcl");
        write_file(&dir, "conf.d/a.elcl");
        write_file(&dir, "conf.d/b.elcl");
        let including = SourceIdentifier::file(dir.join("main.elcl"));
        let resolver = FileSourceResolver::default();
        let result = resolver.resolve(&SourceResolverContext { include_text: "conf.d/*.elcl", source_identifier: &including }).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].path < result[1].path);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn double_star_matches_nested_directories() {
        let dir = tempdir();
        write_file(&dir, "main.elcl");
        write_file(&dir, "conf.d/sub/c.elcl");
        let including = SourceIdentifier::file(dir.join("main.elcl"));
        let resolver = FileSourceResolver::default();
        let result = resolver.resolve(&SourceResolverContext { include_text: "conf.d/**/*.elcl", source_identifier: &including }).unwrap();
        assert_eq!(result.len(), 1);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn access_policy_rejects_parent_directory_traversal_by_default() {
        let dir = tempdir();
        fs::create_dir_all(dir.join("sub")).unwrap();
        write_file(&dir.join("sub"), "main.elcl");
        write_file(&dir, "outside.elcl");
        let including = SourceIdentifier::file(dir.join("sub").join("main.elcl"));
        let resolver = FileSourceResolver::default();
        let err = resolver.resolve(&SourceResolverContext { include_text: "../outside.elcl", source_identifier: &including }).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Access);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn any_directory_policy_allows_parent_traversal() {
        let dir = tempdir();
        fs::create_dir_all(dir.join("sub")).unwrap();
        write_file(&dir.join("sub"), "main.elcl");
        write_file(&dir, "outside.elcl");
        let including = SourceIdentifier::file(dir.join("sub").join("main.elcl"));
        let resolver = FileSourceResolver::new(AccessPolicy::default().with_any_directory(true));
        let result = resolver.resolve(&SourceResolverContext { include_text: "../outside.elcl", source_identifier: &including }).unwrap();
        assert_eq!(result.len(), 1);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn require_suffix_policy_rejects_other_extensions() {
        let dir = tempdir();
        write_file(&dir, "main.elcl");
        write_file(&dir, "a.txt");
        let including = SourceIdentifier::file(dir.join("main.elcl"));
        let resolver = FileSourceResolver::new(AccessPolicy::default().with_require_suffix(true));
        let err = resolver.resolve(&SourceResolverContext { include_text: "a.txt", source_identifier: &including }).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Access);
        fs::remove_dir_all(&dir).ok();
    }
}

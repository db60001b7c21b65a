use std::fs;
use std::path::{Path, PathBuf};

use syntax::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// A single path-name pattern, possibly containing `*` wildcards. Never
    /// `**` — that is [`Segment::DoubleStar`].
    Literal(String),
    /// `**`: matches zero or more whole directory segments.
    DoubleStar,
}

impl Segment {
    fn is_wildcard(&self) -> bool {
        match self {
            Segment::Literal(s) => s.contains('*'),
            Segment::DoubleStar => true,
        }
    }
}

/// A parsed `@include` path: an optional UNC host/share prefix, whether the
/// path is filesystem-absolute, and its segments.
#[derive(Debug, Clone)]
pub struct IncludePath {
    absolute: bool,
    unc_prefix: Option<(String, String)>,
    segments: Vec<Segment>,
}

impl IncludePath {
    pub fn parse(raw: &str) -> Result<Self> {
        let text = raw.strip_prefix("file:").unwrap_or(raw);
        let normalized: String = text.chars().map(|c| if c == '\\' { '/' } else { c }).collect();

        let (unc_prefix, rest) = parse_unc_prefix(&normalized)?;
        let absolute = unc_prefix.is_some() || rest.starts_with('/');
        let trimmed = rest.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(Error::syntax("an include path must name at least one file"));
        }

        let mut segments = Vec::new();
        let mut double_star_count = 0;
        for part in trimmed.split('/') {
            if part.is_empty() {
                continue;
            }
            if part == "**" {
                double_star_count += 1;
                if double_star_count > 1 {
                    return Err(Error::syntax("an include path must not contain more than one '**' segment"));
                }
                segments.push(Segment::DoubleStar);
            } else if part.contains("**") {
                return Err(Error::syntax("'**' must not be combined with literal characters in the same segment"));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self { absolute, unc_prefix, segments })
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(Segment::is_wildcard)
    }

    fn base_is_absolute(&self) -> bool {
        self.absolute
    }
}

fn parse_unc_prefix(normalized: &str) -> Result<(Option<(String, String)>, &str)> {
    if let Some(rest) = normalized.strip_prefix("//") {
        let mut parts = rest.splitn(3, '/');
        let host = parts.next().unwrap_or_default();
        let share = parts.next().unwrap_or_default();
        if host.is_empty() || share.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.') {
            return Err(Error::syntax("a UNC include path must be of the form //host/share/..."));
        }
        let remainder = parts.next().unwrap_or("");
        return Ok((Some((host.to_string(), share.to_string())), remainder));
    }
    Ok((None, normalized))
}

/// Resolve `include_path` against `base_dir` (the directory of the
/// including source), returning every matching, canonicalized file path.
pub fn resolve(base_dir: &Path, include_path: &IncludePath) -> Result<Vec<PathBuf>> {
    let root = if let Some((host, share)) = &include_path.unc_prefix {
        PathBuf::from(format!("//{host}/{share}"))
    } else if include_path.base_is_absolute() {
        PathBuf::from("/")
    } else {
        base_dir.to_path_buf()
    };

    let raw_matches = walk(&root, &include_path.segments)?;
    let mut resolved = Vec::with_capacity(raw_matches.len());
    for path in raw_matches {
        let is_last_wildcard = include_path.segments.last().is_some_and(Segment::is_wildcard);
        let metadata = fs::metadata(&path);
        match metadata {
            Ok(meta) if meta.is_dir() => {
                if !is_last_wildcard {
                    return Err(Error::syntax(format!("the include path '{}' names a directory, not a file", path.display())));
                }
                // A wildcard segment matched a directory: not a file, skip it silently.
                continue;
            }
            Ok(_) => resolved.push(fs::canonicalize(&path).unwrap_or(path)),
            Err(_) => continue,
        }
    }
    Ok(resolved)
}

fn walk(base: &Path, segments: &[Segment]) -> Result<Vec<PathBuf>> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(vec![base.to_path_buf()]);
    };

    match first {
        Segment::DoubleStar => {
            let mut results = walk(base, rest)?;
            if let Ok(entries) = fs::read_dir(base) {
                let mut subdirs: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                    .map(|e| e.path())
                    .collect();
                subdirs.sort();
                for subdir in subdirs {
                    results.extend(walk(&subdir, segments)?);
                }
            }
            Ok(results)
        }
        Segment::Literal(pattern) => {
            if !pattern.contains('*') {
                let candidate = base.join(pattern);
                if rest.is_empty() {
                    return Ok(if candidate.exists() { vec![candidate] } else { vec![] });
                }
                if candidate.is_dir() {
                    return walk(&candidate, rest);
                }
                return Ok(vec![]);
            }

            let mut results = Vec::new();
            let Ok(entries) = fs::read_dir(base) else {
                return Ok(results);
            };
            let mut names: Vec<String> = entries.filter_map(|e| e.ok()).filter_map(|e| e.file_name().into_string().ok()).collect();
            names.sort();
            for name in names {
                if !glob_match(pattern, &name) {
                    continue;
                }
                let candidate = base.join(&name);
                if rest.is_empty() {
                    results.push(candidate);
                } else if candidate.is_dir() {
                    results.extend(walk(&candidate, rest)?);
                }
            }
            Ok(results)
        }
    }
}

/// Match a single path segment against a `*`-wildcard pattern. `*` matches
/// zero or more characters and never crosses a `/` (callers only ever
/// invoke this on one path component at a time, so there is nothing to
/// cross).
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    glob_match_impl(&pattern, &name)
}

fn glob_match_impl(pattern: &[char], name: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => glob_match_impl(&pattern[1..], name) || (!name.is_empty() && glob_match_impl(pattern, &name[1..])),
        Some(c) => name.first() == Some(c) && glob_match_impl(&pattern[1..], &name[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_double_wildcard_combined_with_literal() {
        assert!(IncludePath::parse("a/b**c/d.elcl").is_err());
    }

    #[test]
    fn rejects_more_than_one_double_star() {
        assert!(IncludePath::parse("**/a/**/b.elcl").is_err());
    }

    #[test]
    fn accepts_backslash_and_forward_slash_separators() {
        let a = IncludePath::parse("a/b.elcl").unwrap();
        let b = IncludePath::parse("a\\b.elcl").unwrap();
        assert_eq!(a.segments, b.segments);
    }

    #[test]
    fn glob_match_handles_star_in_middle() {
        assert!(glob_match("a*.elcl", "a123.elcl"));
        assert!(glob_match("a*.elcl", "a.elcl"));
        assert!(!glob_match("a*.elcl", "b.elcl"));
    }

    #[test]
    fn rejects_malformed_unc_host() {
        assert!(IncludePath::parse("//bad host/share/a.elcl").is_err());
    }

    #[test]
    fn accepts_well_formed_unc_path() {
        let parsed = IncludePath::parse("//server.local/share/a.elcl").unwrap();
        assert!(parsed.unc_prefix.is_some());
    }
}

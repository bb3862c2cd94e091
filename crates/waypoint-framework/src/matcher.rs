//! Destination pattern matching.
//!
//! Patterns are `/`-separated segment lists. Each segment is one of:
//!
//! | Segment  | Matches                                                   |
//! |----------|-----------------------------------------------------------|
//! | `text`   | exactly `text`                                            |
//! | `{name}` | one segment, captured under `name`                        |
//! | `*`      | one arbitrary segment, not captured                       |
//! | `**`     | zero or more remaining segments (last position only)      |
//!
//! Patterns are parsed once into a [`DestinationPattern`] and then matched
//! against many destinations. When several patterns match the same
//! destination, [`DestinationPattern::compare`] ranks them so the most
//! specific one wins.
//!
//! # Example
//!
//! ```rust
//! use waypoint_framework::matcher::DestinationPattern;
//!
//! let pattern = DestinationPattern::parse("/message/{foo}/{name}").unwrap();
//! let vars = pattern.match_destination("/message/bar/value").unwrap();
//!
//! assert_eq!(vars["foo"], "bar");
//! assert_eq!(vars["name"], "value");
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::error::PatternError;

/// Variables captured from a destination, keyed by capture name.
pub type PathVariables = HashMap<String, String>;

/// A single parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
    Wildcard,
    DoubleWildcard,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, PatternError> {
        match raw {
            "*" => return Ok(Self::Wildcard),
            "**" => return Ok(Self::DoubleWildcard),
            _ => {}
        }

        if let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if name.is_empty() {
                return Err(PatternError::EmptyVariable {
                    pattern: pattern.to_string(),
                });
            }
            if !name.contains(['{', '}', '*']) {
                return Ok(Self::Variable(name.to_string()));
            }
        }

        if raw.contains(['{', '}', '*']) {
            return Err(PatternError::MalformedSegment {
                pattern: pattern.to_string(),
                segment: raw.to_string(),
            });
        }

        Ok(Self::Literal(raw.to_string()))
    }
}

fn tokenize(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// =============================================================================
// DestinationPattern
// =============================================================================

/// A parsed destination pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPattern {
    raw: String,
    absolute: bool,
    trailing_slash: bool,
    segments: Vec<Segment>,
}

impl DestinationPattern {
    /// Parses a pattern string.
    ///
    /// Empty segments are ignored, so `/a//b` is the same pattern as `/a/b`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();

        for raw in tokenize(pattern) {
            if matches!(segments.last(), Some(Segment::DoubleWildcard)) {
                return Err(PatternError::DoubleWildcardNotLast {
                    pattern: pattern.to_string(),
                });
            }

            let segment = Segment::parse(raw, pattern)?;
            if let Segment::Variable(name) = &segment {
                if names.contains(name) {
                    return Err(PatternError::DuplicateVariable {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
                names.push(name.clone());
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            absolute: pattern.starts_with('/'),
            trailing_slash: pattern.len() > 1 && pattern.ends_with('/'),
            segments,
        })
    }

    /// Returns the pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if the pattern contains no captures or wildcards.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Returns `true` if the pattern ends with `**`.
    pub fn has_double_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::DoubleWildcard))
    }

    /// Returns the names of all captures in declaration order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn matches(&self, destination: &str) -> bool {
        self.match_destination(destination).is_some()
    }

    /// Matches a destination, returning the captured variables on success.
    pub fn match_destination(&self, destination: &str) -> Option<PathVariables> {
        if self.absolute != destination.starts_with('/') {
            return None;
        }

        let mut variables = PathVariables::new();
        let mut tokens = tokenize(destination);

        for segment in &self.segments {
            match segment {
                Segment::Literal(expected) => {
                    if tokens.next()? != expected {
                        return None;
                    }
                }
                Segment::Variable(name) => {
                    let value = tokens.next()?;
                    variables.insert(name.clone(), value.to_string());
                }
                Segment::Wildcard => {
                    tokens.next()?;
                }
                Segment::DoubleWildcard => return Some(variables),
            }
        }

        if tokens.next().is_some() {
            return None;
        }

        let dest_trailing = destination.len() > 1 && destination.ends_with('/');
        if self.trailing_slash != dest_trailing {
            return None;
        }

        Some(variables)
    }

    /// Ranks two patterns that both match `destination`.
    ///
    /// [`Ordering::Less`] means `self` is the better match. Criteria, in order:
    ///
    /// 1. a pattern equal to the destination text wins;
    /// 2. patterns without `**` beat patterns with it;
    /// 3. fewer captures plus `*` segments;
    /// 4. more literal segments;
    /// 5. fewer `*` segments;
    /// 6. lexical order of the pattern text.
    pub fn compare(&self, other: &Self, destination: &str) -> Ordering {
        let inexact = |p: &Self| p.raw != destination;

        inexact(self)
            .cmp(&inexact(other))
            .then_with(|| {
                self.has_double_wildcard()
                    .cmp(&other.has_double_wildcard())
            })
            .then_with(|| self.open_segments().cmp(&other.open_segments()))
            .then_with(|| other.literal_count().cmp(&self.literal_count()))
            .then_with(|| self.wildcard_count().cmp(&other.wildcard_count()))
            .then_with(|| self.raw.cmp(&other.raw))
    }

    fn literal_count(&self) -> usize {
        self.count(|s| matches!(s, Segment::Literal(_)))
    }

    fn wildcard_count(&self) -> usize {
        self.count(|s| matches!(s, Segment::Wildcard))
    }

    fn open_segments(&self) -> usize {
        self.count(|s| matches!(s, Segment::Variable(_) | Segment::Wildcard))
    }

    fn count(&self, f: impl Fn(&Segment) -> bool) -> usize {
        self.segments.iter().filter(|s| f(s)).count()
    }
}

impl fmt::Display for DestinationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// =============================================================================
// PathMatcher
// =============================================================================

/// String-level convenience API over [`DestinationPattern`].
///
/// Each call parses the pattern; hot paths should parse once and keep the
/// [`DestinationPattern`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PathMatcher;

impl PathMatcher {
    pub fn matches(&self, pattern: &str, destination: &str) -> bool {
        DestinationPattern::parse(pattern).is_ok_and(|p| p.matches(destination))
    }

    /// Returns the captured variables, or `None` if the pattern is invalid or
    /// does not match.
    pub fn extract_variables(&self, pattern: &str, destination: &str) -> Option<PathVariables> {
        DestinationPattern::parse(pattern)
            .ok()?
            .match_destination(destination)
    }

    /// Ranks two pattern strings for `destination`. An unparsable pattern
    /// ranks below any valid one.
    pub fn compare(&self, a: &str, b: &str, destination: &str) -> Ordering {
        match (DestinationPattern::parse(a), DestinationPattern::parse(b)) {
            (Ok(a), Ok(b)) => a.compare(&b, destination),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        }
    }

    /// Joins a type-level prefix and a method-level pattern with exactly one
    /// `/` between them.
    pub fn combine(&self, prefix: &str, pattern: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return pattern.to_string();
        }
        if pattern.is_empty() {
            return prefix.to_string();
        }
        format!("{prefix}/{}", pattern.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(p: &str) -> DestinationPattern {
        DestinationPattern::parse(p).unwrap()
    }

    #[test]
    fn test_literal_match() {
        let p = parse("/foo/bar");
        assert!(p.is_literal());
        assert!(p.matches("/foo/bar"));
        assert!(!p.matches("/foo/baz"));
        assert!(!p.matches("/foo"));
        assert!(!p.matches("/foo/bar/baz"));
        assert!(!p.matches("foo/bar"));
    }

    #[test]
    fn test_empty_segments_are_ignored() {
        let p = parse("/a//b");
        assert!(p.matches("/a/b"));
        assert!(parse("/a/b").matches("/a//b"));
    }

    #[test]
    fn test_trailing_slash_must_agree() {
        assert!(!parse("/a/b").matches("/a/b/"));
        assert!(parse("/a/b/").matches("/a/b/"));
        assert!(parse("/a/**").matches("/a/b/"));
    }

    #[test]
    fn test_variable_capture() {
        let vars = parse("/message/{foo}/{name}")
            .match_destination("/message/bar/value")
            .unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["foo"], "bar");
        assert_eq!(vars["name"], "value");
    }

    #[test]
    fn test_single_wildcard_matches_one_segment() {
        let p = parse("/a/*/c");
        assert!(p.matches("/a/b/c"));
        assert!(!p.matches("/a/c"));
        assert!(!p.matches("/a/b/b/c"));
        assert!(p.match_destination("/a/x/c").unwrap().is_empty());
    }

    #[test]
    fn test_double_wildcard_matches_zero_or_more() {
        let p = parse("/pathmatch/wildcard/**");
        assert!(p.matches("/pathmatch/wildcard"));
        assert!(p.matches("/pathmatch/wildcard/test"));
        assert!(p.matches("/pathmatch/wildcard/a/b/c"));
        assert!(!p.matches("/pathmatch/other/test"));
        assert!(
            p.match_destination("/pathmatch/wildcard/test")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            DestinationPattern::parse("/a/**/b"),
            Err(PatternError::DoubleWildcardNotLast { .. })
        ));
        assert!(matches!(
            DestinationPattern::parse("/a/{}"),
            Err(PatternError::EmptyVariable { .. })
        ));
        assert!(matches!(
            DestinationPattern::parse("/a/{x}/{x}"),
            Err(PatternError::DuplicateVariable { name, .. }) if name == "x"
        ));
        assert!(matches!(
            DestinationPattern::parse("/a/pre{x}"),
            Err(PatternError::MalformedSegment { .. })
        ));
        assert!(matches!(
            DestinationPattern::parse("/a/b*"),
            Err(PatternError::MalformedSegment { .. })
        ));
    }

    #[test]
    fn test_best_match_prefers_capture_over_double_wildcard() {
        let dest = "/bestmatch/bar/path";
        let specific = parse("/bestmatch/{foo}/path");
        let catch_all = parse("/bestmatch/**");

        assert!(specific.matches(dest));
        assert!(catch_all.matches(dest));
        assert_eq!(specific.compare(&catch_all, dest), Ordering::Less);
        assert_eq!(catch_all.compare(&specific, dest), Ordering::Greater);
    }

    #[test]
    fn test_compare_ordering_rules() {
        let dest = "/a/b/c";
        // Exact text first.
        assert_eq!(parse("/a/b/c").compare(&parse("/a/{x}/c"), dest), Ordering::Less);
        // Fewer captures.
        assert_eq!(
            parse("/a/{x}/c").compare(&parse("/a/{x}/{y}"), dest),
            Ordering::Less
        );
        // Captures and `*` count together.
        assert_eq!(parse("/a/*/c").compare(&parse("/{x}/b/*"), dest), Ordering::Less);
        // Same shape, `*` loses to a capture.
        assert_eq!(parse("/a/{x}/c").compare(&parse("/a/*/c"), dest), Ordering::Less);
        // Lexical tie-break is deterministic.
        assert_eq!(
            parse("/a/{p}/c").compare(&parse("/a/{q}/c"), dest),
            Ordering::Less
        );
    }

    #[test]
    fn test_path_matcher_string_api() {
        let m = PathMatcher;
        assert!(m.matches("/sub/{foo}/{name}", "/sub/bar/value"));
        assert!(!m.matches("/a/**/b", "/a/x/b"));
        assert_eq!(
            m.extract_variables("/binding/id/{id}", "/binding/id/12")
                .unwrap()["id"],
            "12"
        );
        assert_eq!(m.compare("/a/{x}", "/a/**/b", "/a/b"), Ordering::Less);
    }

    #[test]
    fn test_combine() {
        let m = PathMatcher;
        assert_eq!(m.combine("/app", "/greet"), "/app/greet");
        assert_eq!(m.combine("/app/", "greet"), "/app/greet");
        assert_eq!(m.combine("", "/greet"), "/greet");
        assert_eq!(m.combine("/app", ""), "/app");
    }
}

//! tern-router: Zero-dependency segment pattern router
//!
//! Matches concrete request paths against registered patterns and
//! extracts named parameters. Used by tern-core's dispatcher.
//!
//! ## Pattern Syntax
//! Patterns are split on `/`. Each segment is one of:
//! - `users` - Literal (matches only `users`)
//! - `{id}` - Named parameter (captures the whole segment)
//! - `v{id}` - Prefixed parameter (captures the segment minus the
//!   leading `len("v")` bytes)
//! - empty - produced by a leading or doubled `/`, matches anything
//!
//! A path only matches a pattern with the same number of segments.
//! Empty segments are kept, so `/users/` does not match `/users`.
//!
//! ## Priority
//! Patterns are tried in registration order and the first one whose
//! segments all match wins. Re-registering a pattern replaces its
//! handler id but keeps its position.
//!
//! ## Example
//! ```
//! use tern_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("/users", 0);
//! router.insert("/users/{id}", 1);
//! router.insert("/files/v{version}", 2);
//!
//! let m = router.find("/users/123").unwrap();
//! assert_eq!(m.handler_id, 1);
//! assert_eq!(m.params, vec![("id".to_string(), "123".to_string())]);
//!
//! let m = router.find("/files/v7").unwrap();
//! assert_eq!(m.params_map().get("version").map(String::as_str), Some("7"));
//! ```

use std::collections::HashMap;
use std::fmt;

/// How prefixed segments (`v{id}`) treat the literal prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixPolicy {
    /// Discard the first `len(prefix)` bytes of the concrete segment
    /// whatever they contain.
    #[default]
    Permissive,
    /// Only match when the concrete segment starts with the prefix.
    Strict,
}

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Pattern string the path matched, as registered
    pub pattern: String,
    /// The matched handler ID
    pub handler_id: u32,
    /// Captured path parameters as (name, value) pairs
    pub params: Vec<(String, String)>,
}

impl Match {
    /// Get params as HashMap for convenient access
    ///
    /// A name captured twice keeps its last value.
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

/// Why a pattern rejected a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// Pattern and path have a different number of segments
    SegmentCount { expected: usize, found: usize },
    /// The segment at `index` did not satisfy the pattern
    Segment { index: usize },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::SegmentCount { expected, found } => {
                write!(f, "expected {} segments, found {}", expected, found)
            }
            Mismatch::Segment { index } => write!(f, "segment {} does not match", index),
        }
    }
}

impl std::error::Error for Mismatch {}

/// Compiled pattern segment
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Skip,
    Literal(String),
    Named(String),
    Prefixed { prefix: String, name: String },
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Segment::Skip;
        }

        if raw.len() >= 2 && raw.starts_with('{') && raw.ends_with('}') {
            return Segment::Named(raw[1..raw.len() - 1].to_string());
        }

        // `literal{name}` - anything after the closing brace makes it a plain literal
        if raw.ends_with('}') {
            if let Some((prefix, rest)) = raw.split_once('{') {
                return Segment::Prefixed {
                    prefix: prefix.to_string(),
                    name: rest[..rest.len() - 1].to_string(),
                };
            }
        }

        Segment::Literal(raw.to_string())
    }
}

/// A route pattern split into segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern. Never fails: malformed brace segments become
    /// literals and only match identical text.
    pub fn parse(pattern: &str) -> Self {
        Self {
            source: pattern.to_string(),
            segments: pattern.split('/').map(Segment::parse).collect(),
        }
    }

    /// The pattern string as registered
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of `/`-delimited segments, empty ones included
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Names of the parameters this pattern captures, in segment order
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Named(name) | Segment::Prefixed { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Match pre-split path segments against this pattern
    pub fn match_segments(
        &self,
        segments: &[&str],
        policy: PrefixPolicy,
    ) -> Result<Vec<(String, String)>, Mismatch> {
        if segments.len() != self.segments.len() {
            return Err(Mismatch::SegmentCount {
                expected: self.segments.len(),
                found: segments.len(),
            });
        }

        let mut params = Vec::new();
        for (index, (segment, value)) in self.segments.iter().zip(segments).enumerate() {
            match segment {
                Segment::Skip => {}
                Segment::Named(name) => params.push((name.clone(), value.to_string())),
                Segment::Literal(text) => {
                    if text.as_str() != *value {
                        return Err(Mismatch::Segment { index });
                    }
                }
                Segment::Prefixed { prefix, name } => {
                    // A segment spelled exactly like the pattern is a literal hit
                    if self.raw_segment(index) == Some(*value) {
                        continue;
                    }
                    let rest = match policy {
                        PrefixPolicy::Permissive => value.get(prefix.len()..),
                        PrefixPolicy::Strict => value.strip_prefix(prefix.as_str()),
                    };
                    match rest {
                        Some(rest) => params.push((name.clone(), rest.to_string())),
                        None => return Err(Mismatch::Segment { index }),
                    }
                }
            }
        }

        Ok(params)
    }

    /// Match a concrete path against this pattern
    pub fn match_path(
        &self,
        path: &str,
        policy: PrefixPolicy,
    ) -> Result<Vec<(String, String)>, Mismatch> {
        let segments: Vec<&str> = path.split('/').collect();
        self.match_segments(&segments, policy)
    }

    fn raw_segment(&self, index: usize) -> Option<&str> {
        self.source.split('/').nth(index)
    }
}

#[derive(Debug)]
struct Entry {
    pattern: Pattern,
    handler_id: u32,
}

/// Zero-dependency segment pattern router
///
/// Entries are kept in registration order with a side index from the
/// pattern string, so exact lookups are O(1) and matching is a linear
/// first-match scan.
#[derive(Debug, Default)]
pub struct Router {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    policy: PrefixPolicy,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with the given prefix policy
    pub fn with_policy(policy: PrefixPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Current prefix policy
    pub fn policy(&self) -> PrefixPolicy {
        self.policy
    }

    /// Insert a route
    ///
    /// Returns the previous handler ID when the exact pattern string was
    /// already registered. The entry keeps its original position.
    ///
    /// # Example
    /// ```
    /// use tern_router::Router;
    ///
    /// let mut router = Router::new();
    /// assert_eq!(router.insert("/users/{id}", 0), None);
    /// assert_eq!(router.insert("/users/{id}", 1), Some(0));
    /// assert_eq!(router.lookup("/users/{id}"), Some(1));
    /// ```
    pub fn insert(&mut self, pattern: &str, handler_id: u32) -> Option<u32> {
        if let Some(&i) = self.index.get(pattern) {
            let entry = &mut self.entries[i];
            return Some(std::mem::replace(&mut entry.handler_id, handler_id));
        }

        self.index.insert(pattern.to_string(), self.entries.len());
        self.entries.push(Entry {
            pattern: Pattern::parse(pattern),
            handler_id,
        });
        None
    }

    /// Remove a route, returning its handler ID
    pub fn remove(&mut self, pattern: &str) -> Option<u32> {
        let i = self.index.remove(pattern)?;
        let entry = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(entry.handler_id)
    }

    /// Exact-string lookup of a registered pattern
    pub fn lookup(&self, pattern: &str) -> Option<u32> {
        self.index.get(pattern).map(|&i| self.entries[i].handler_id)
    }

    /// Find a matching route
    ///
    /// # Returns
    /// The first pattern, in registration order, whose segments all match
    /// `path`, or `None`.
    ///
    /// # Example
    /// ```
    /// use tern_router::Router;
    ///
    /// let mut router = Router::new();
    /// router.insert("/users/{id}", 0);
    ///
    /// let m = router.find("/users/42").unwrap();
    /// assert_eq!(m.pattern, "/users/{id}");
    /// assert_eq!(m.params[0], ("id".to_string(), "42".to_string()));
    /// assert!(router.find("/users/42/posts").is_none());
    /// ```
    pub fn find(&self, path: &str) -> Option<Match> {
        let segments: Vec<&str> = path.split('/').collect();

        self.entries.iter().find_map(|entry| {
            entry
                .pattern
                .match_segments(&segments, self.policy)
                .ok()
                .map(|params| Match {
                    pattern: entry.pattern.as_str().to_string(),
                    handler_id: entry.handler_id,
                    params,
                })
        })
    }

    /// Registered patterns in registration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    /// Number of registered patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no patterns are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

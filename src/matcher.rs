//! Path matchers and predicate-gated appenders
//!
//! Appenders let a host program add options or headers to selected
//! path/method combinations without touching the generated command tree.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use regex::Regex;

use crate::error::MatcherError;
use crate::spec::HttpMethod;

/// `*` stays within one path segment; `**` crosses segments.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A predicate over path patterns such as `/repos/{owner}/{repo}/issues`.
#[derive(Clone)]
pub enum PathMatcher {
    All,
    Exact(String),
    Glob(Pattern),
    /// Anchored: must match the whole path
    Regex(Regex),
    /// Matches when the first matcher does and the second does not
    Except(Box<PathMatcher>, Box<PathMatcher>),
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl PathMatcher {
    pub fn all() -> Self {
        Self::All
    }

    pub fn exact(path: impl Into<String>) -> Self {
        Self::Exact(path.into())
    }

    pub fn glob(pattern: &str) -> Result<Self, MatcherError> {
        Ok(Self::Glob(Pattern::new(pattern)?))
    }

    pub fn regex(regex: &str) -> Result<Self, MatcherError> {
        Ok(Self::Regex(Regex::new(&format!("^(?:{regex})$"))?))
    }

    pub fn custom(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Exclude paths matched by `exception` from this matcher.
    pub fn except(self, exception: PathMatcher) -> Self {
        Self::Except(Box::new(self), Box::new(exception))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(p) => p == path,
            Self::Glob(pattern) => pattern.matches_with(path, GLOB_OPTIONS),
            Self::Regex(re) => re.is_match(path),
            Self::Except(matcher, exception) => matcher.matches(path) && !exception.matches(path),
            Self::Custom(predicate) => predicate(path),
        }
    }
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Exact(p) => f.debug_tuple("Exact").field(p).finish(),
            Self::Glob(p) => f.debug_tuple("Glob").field(&p.as_str()).finish(),
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Except(m, e) => f.debug_tuple("Except").field(m).field(e).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Appends items to a sink when both the path matcher and the operation set
/// accept a path/method pair.
#[derive(Clone)]
pub struct Appender<T> {
    matcher: PathMatcher,
    operations: BTreeSet<HttpMethod>,
    produce: Arc<dyn Fn(&mut Vec<T>) + Send + Sync>,
}

/// Extra command-line arguments, e.g. `--X-API-KEY=secret`.
pub type OptionAppender = Appender<String>;

/// Extra request headers as `(name, value)`.
pub type HeaderAppender = Appender<(String, String)>;

impl<T> Appender<T> {
    pub fn new(
        matcher: PathMatcher,
        operations: impl IntoIterator<Item = HttpMethod>,
        produce: impl Fn(&mut Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            matcher,
            operations: operations.into_iter().collect(),
            produce: Arc::new(produce),
        }
    }

    /// `None` when not applicable; `Some` (possibly empty) when it fired.
    pub fn apply(&self, path: &str, method: HttpMethod) -> Option<Vec<T>> {
        if !self.operations.contains(&method) || !self.matcher.matches(path) {
            return None;
        }
        let mut items = Vec::new();
        (self.produce)(&mut items);
        Some(items)
    }
}

impl<T> fmt::Debug for Appender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Appender")
            .field("matcher", &self.matcher)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// Run every appender for `path`/`method`, concatenating what fired.
pub(crate) fn collect<T>(appenders: &[Appender<T>], path: &str, method: HttpMethod) -> Vec<T> {
    let mut out = Vec::new();
    for (i, appender) in appenders.iter().enumerate() {
        if let Some(items) = appender.apply(path, method) {
            log::debug!("appender #{i} fired for {method} {path} with {} item(s)", items.len());
            out.extend(items);
        }
    }
    out
}

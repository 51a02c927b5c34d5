//! Method-name matching.
//!
//! # Responsibilities
//! - Match a data-access method name against configured prefixes
//! - Classify a method as a read, a write, or neither
//!
//! # Design Decisions
//! - Matching is ASCII case-insensitive (`getUser`, `GETUSER` and `get_user` match `get`)
//! - Prefixes are ASCII-lowercased at construction, the same folding `matches` uses
//! - Read prefixes are checked before write prefixes
//! - No regex to keep matching allocation-free on the request path

/// Method-name prefixes routed to replicas by default.
pub const DEFAULT_READ_PREFIXES: &[&str] = &[
    "select", "get", "find", "query", "list", "count", "exists", "check",
];

/// Method-name prefixes routed to the primary by default.
pub const DEFAULT_WRITE_PREFIXES: &[&str] = &[
    "insert", "add", "create", "save", "update", "modify", "edit", "delete", "remove", "drop",
    "truncate", "batch",
];

/// Matches method names starting with one prefix.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    /// The prefix is normalized to lowercase for case-insensitive matching.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, method_name: &str) -> bool {
        method_name
            .get(..self.prefix.len())
            .map(|head| head.eq_ignore_ascii_case(&self.prefix))
            .unwrap_or(false)
    }
}

/// Combines prefix matchers with OR semantics.
#[derive(Debug, Clone, Default)]
pub struct PrefixSet {
    matchers: Vec<PrefixMatcher>,
}

impl PrefixSet {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matchers: prefixes.into_iter().map(PrefixMatcher::new).collect(),
        }
    }

    /// First prefix matching `method_name`, if any.
    pub fn find(&self, method_name: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.matches(method_name))
            .map(PrefixMatcher::prefix)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// How a method name classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind<'a> {
    /// Matched a read prefix.
    Read(&'a str),
    /// Matched a write prefix.
    Write(&'a str),
    Unclassified,
}

/// Read/write classifier over two prefix sets.
#[derive(Debug, Clone)]
pub struct MethodClassifier {
    read: PrefixSet,
    write: PrefixSet,
}

impl MethodClassifier {
    pub fn new(read: PrefixSet, write: PrefixSet) -> Self {
        Self { read, write }
    }

    pub fn classify(&self, method_name: &str) -> MethodKind<'_> {
        if let Some(prefix) = self.read.find(method_name) {
            return MethodKind::Read(prefix);
        }
        if let Some(prefix) = self.write.find(method_name) {
            return MethodKind::Write(prefix);
        }
        MethodKind::Unclassified
    }
}

impl Default for MethodClassifier {
    fn default() -> Self {
        Self::new(
            PrefixSet::new(DEFAULT_READ_PREFIXES.iter().copied()),
            PrefixSet::new(DEFAULT_WRITE_PREFIXES.iter().copied()),
        )
    }
}

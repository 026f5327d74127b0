//! Path classification against the exemption rule table
//!
//! Rules are sorted once at construction: exact literals first, then
//! prefixes (longest first), then patterns in declaration order. The first
//! rule that applies decides. A path containing the privileged segment is
//! classified before any rule is consulted, so no exemption can open it.

use axum::http::Method;
use regex::Regex;
use std::cmp::Reverse;
use std::fmt;

use crate::config::ConfigError;

/// How a conditionally exempt path treats a present but malformed
/// `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedHeaderPolicy {
    /// Treat the caller as anonymous and forward
    #[default]
    Forward,
    /// Reject with 401
    Reject,
}

/// Authentication requirement resolved for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Forwarded without looking at any header
    Exempt,
    /// Anonymous callers pass; a presented credential is still validated
    ConditionallyExempt {
        /// What to do with a header that is present but not `Bearer <token>`
        on_malformed: MalformedHeaderPolicy,
    },
    /// Valid credential required
    RequiresAuth,
    /// Valid credential and the admin role required
    RequiresAdmin,
}

impl PathClass {
    /// Short label for logs and metrics
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exempt => "exempt",
            Self::ConditionallyExempt { .. } => "conditional",
            Self::RequiresAuth => "authenticated",
            Self::RequiresAdmin => "admin",
        }
    }
}

/// Path predicate of one rule.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Literal path equality
    Exact(String),
    /// Segment-aware prefix: `/books` matches `/books` and `/books/..`
    Prefix(String),
    /// Anchored regular expression
    Pattern(Regex),
}

impl PathMatcher {
    /// Compiles an anchored pattern matcher.
    pub fn pattern(source: &str) -> Result<Self, ConfigError> {
        Regex::new(&format!("^(?:{source})$"))
            .map(Self::Pattern)
            .map_err(|e| ConfigError::InvalidRule {
                rule: source.to_string(),
                reason: e.to_string(),
            })
    }

    /// Whether `path` satisfies this matcher
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(literal) => path == literal,
            Self::Prefix(prefix) => has_segment_prefix(path, prefix),
            Self::Pattern(regex) => regex.is_match(path),
        }
    }

    const fn tier(&self) -> u8 {
        match self {
            Self::Exact(_) => 0,
            Self::Prefix(_) => 1,
            Self::Pattern(_) => 2,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::Exact(s) | Self::Prefix(s) => s,
            Self::Pattern(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "exact {s}"),
            Self::Prefix(s) => write!(f, "prefix {s}"),
            Self::Pattern(regex) => write!(f, "pattern {}", regex.as_str()),
        }
    }
}

fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// One declarative exemption rule.
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    matcher: PathMatcher,
    methods: Option<Vec<Method>>,
    unless_prefix: Vec<String>,
    class: PathClass,
}

impl ExclusionRule {
    /// Rule applying to every method
    pub const fn new(matcher: PathMatcher, class: PathClass) -> Self {
        Self {
            matcher,
            methods: None,
            unless_prefix: Vec::new(),
            class,
        }
    }

    /// Restricts the rule to the given methods
    #[must_use]
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = if methods.is_empty() { None } else { Some(methods) };
        self
    }

    /// Carves paths under `prefix` out of this rule
    #[must_use]
    pub fn unless_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unless_prefix.push(prefix.into());
        self
    }

    /// Class granted when the rule applies
    pub const fn class(&self) -> PathClass {
        self.class
    }

    /// Whether the rule applies to `(method, path)`
    pub fn applies(&self, method: &Method, path: &str) -> bool {
        self.methods.as_ref().is_none_or(|m| m.contains(method))
            && self.matcher.matches(path)
            && !self
                .unless_prefix
                .iter()
                .any(|carve_out| has_segment_prefix(path, carve_out))
    }

    fn overlaps(&self, other: &Self) -> bool {
        if self.matcher.tier() != other.matcher.tier()
            || self.matcher.source() != other.matcher.source()
        {
            return false;
        }
        match (&self.methods, &other.methods) {
            (Some(a), Some(b)) => a.iter().any(|m| b.contains(m)),
            _ => true,
        }
    }
}

/// Immutable classifier shared by every request.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    rules: Vec<ExclusionRule>,
    privileged_segment: Option<String>,
}

impl PathClassifier {
    /// Sorts the rules by specificity and rejects ambiguous tables.
    pub fn new(
        mut rules: Vec<ExclusionRule>,
        privileged_segment: Option<String>,
    ) -> Result<Self, ConfigError> {
        for (i, rule) in rules.iter().enumerate() {
            if let Some(twin) = rules[i + 1..].iter().find(|other| rule.overlaps(other)) {
                return Err(ConfigError::AmbiguousRules {
                    first: rule.matcher.to_string(),
                    second: twin.matcher.to_string(),
                });
            }
        }

        rules.sort_by_key(|rule| {
            let prefix_len = match &rule.matcher {
                PathMatcher::Prefix(prefix) => prefix.len(),
                _ => 0,
            };
            (rule.matcher.tier(), Reverse(prefix_len))
        });

        Ok(Self {
            rules,
            privileged_segment: privileged_segment.filter(|s| !s.is_empty()),
        })
    }

    /// Resolves the authentication requirement for `(method, path)`
    pub fn classify(&self, method: &Method, path: &str) -> PathClass {
        if self.is_privileged(path) {
            return PathClass::RequiresAdmin;
        }

        self.rules
            .iter()
            .find(|rule| rule.applies(method, path))
            .map_or(PathClass::RequiresAuth, ExclusionRule::class)
    }

    /// Number of rules in the table
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn is_privileged(&self, path: &str) -> bool {
        self.privileged_segment
            .as_deref()
            .is_some_and(|segment| path.split('/').any(|s| s == segment))
    }
}

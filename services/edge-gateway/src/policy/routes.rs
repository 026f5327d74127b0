//! Backend route table
//!
//! Ant-style globs: `*` matches exactly one path segment and `**` matches any
//! number of trailing or inner segments, including none. Routes are tried in
//! declaration order and the first match wins.

use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    AnyDepth,
}

/// Compiled path glob.
#[derive(Debug, Clone)]
pub struct PathGlob {
    source: String,
    segments: Vec<Segment>,
}

impl PathGlob {
    /// Compiles `pattern`; it must be absolute.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if !pattern.starts_with('/') {
            return Err(ConfigError::InvalidRule {
                rule: pattern.to_string(),
                reason: "route patterns must start with `/`".to_string(),
            });
        }

        let segments = split(pattern)
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::AnyDepth,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// Whether `path` matches the glob
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split(path).collect();
        match_segments(&self.segments, &parts)
    }

    /// Pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((head, rest)) => path.split_first().is_some_and(|(first, tail)| {
            let hit = match head {
                Segment::Literal(literal) => literal == first,
                Segment::Any | Segment::AnyDepth => true,
            };
            hit && match_segments(rest, tail)
        }),
    }
}

/// Backend resolved for a request.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Logical backend name, lowercased
    pub name: Arc<str>,
    /// Base URL requests are forwarded to
    pub base_url: Url,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    glob: PathGlob,
    backend: Backend,
}

/// Ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Builds the table, resolving every backend name up front.
    ///
    /// Backend names compare case-insensitively.
    pub fn new(
        routes: &[(String, Vec<String>)],
        backends: &HashMap<String, Url>,
    ) -> Result<Self, ConfigError> {
        let backends: HashMap<String, &Url> = backends
            .iter()
            .map(|(name, url)| (name.to_ascii_lowercase(), url))
            .collect();

        let mut entries = Vec::new();
        for (name, patterns) in routes {
            let name = name.to_ascii_lowercase();
            let base_url = backends
                .get(&name)
                .ok_or_else(|| ConfigError::UnknownBackend {
                    backend: name.clone(),
                })?;
            let backend = Backend {
                name: Arc::from(name.as_str()),
                base_url: (*base_url).clone(),
            };
            for pattern in patterns {
                entries.push(RouteEntry {
                    glob: PathGlob::new(pattern)?,
                    backend: backend.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    /// First backend whose route matches `path`
    pub fn resolve(&self, path: &str) -> Option<&Backend> {
        self.entries
            .iter()
            .find(|entry| entry.glob.matches(path))
            .map(|entry| &entry.backend)
    }

    /// Number of route patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no routes
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

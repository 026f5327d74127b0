//! Gateway policy: exemption rules, privileged segment and backend routes
//!
//! The policy is a declarative document read once at startup with the
//! `config` crate (TOML, YAML or JSON by file extension). When no file is
//! configured the built-in bookstore table is used.

pub mod classifier;
pub mod routes;

use axum::http::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use url::Url;

use crate::config::ConfigError;

pub use classifier::{ExclusionRule, MalformedHeaderPolicy, PathClass, PathClassifier, PathMatcher};
pub use routes::{Backend, PathGlob, RouteTable};

const BUILTIN_POLICY: &str = include_str!("../../config/policy.toml");

/// How a rule's `path` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Literal path
    Exact,
    /// Segment-aware prefix
    Prefix,
    /// Anchored regular expression
    Pattern,
}

/// Access level a rule grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// No credential inspection
    Exempt,
    /// Anonymous allowed, presented credentials validated
    Conditional,
    /// Credential required
    Authenticated,
    /// Credential and admin role required
    Admin,
}

/// One rule as written in the policy document.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    /// Matcher kind
    pub kind: RuleKind,
    /// Literal path, prefix or regex source
    pub path: String,
    /// Methods the rule applies to; empty means all
    #[serde(default)]
    pub methods: Vec<String>,
    /// Granted access
    pub access: Access,
    /// Prefixes carved out of the rule
    #[serde(default)]
    pub unless_prefix: Vec<String>,
    /// Malformed-header handling, conditional rules only
    #[serde(default)]
    pub on_malformed: Option<MalformedHeaderPolicy>,
}

impl RuleSpec {
    fn compile(&self) -> Result<ExclusionRule, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRule {
            rule: self.path.clone(),
            reason,
        };

        let matcher = match self.kind {
            RuleKind::Exact => PathMatcher::Exact(self.path.clone()),
            RuleKind::Prefix => PathMatcher::Prefix(self.path.clone()),
            RuleKind::Pattern => PathMatcher::pattern(&self.path)?,
        };

        let class = match (self.access, self.on_malformed) {
            (Access::Conditional, on_malformed) => PathClass::ConditionallyExempt {
                on_malformed: on_malformed.unwrap_or_default(),
            },
            (_, Some(_)) => {
                return Err(invalid(
                    "on_malformed only applies to conditional rules".to_string(),
                ));
            }
            (Access::Exempt, None) => PathClass::Exempt,
            (Access::Authenticated, None) => PathClass::RequiresAuth,
            (Access::Admin, None) => PathClass::RequiresAdmin,
        };

        let methods = self
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|e| invalid(format!("method `{m}`: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rule = ExclusionRule::new(matcher, class).with_methods(methods);
        for carve_out in &self.unless_prefix {
            rule = rule.unless_prefix(carve_out.clone());
        }
        Ok(rule)
    }
}

/// Route declaration: every path glob in `paths` goes to `backend`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteSpec {
    /// Logical backend name
    pub backend: String,
    /// Ant-style path globs
    pub paths: Vec<String>,
}

fn default_privileged_segment() -> Option<String> {
    Some("admin".to_string())
}

/// Deserialized policy document.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    /// Path segment that always requires the admin role
    #[serde(default = "default_privileged_segment")]
    pub privileged_segment: Option<String>,
    /// Exemption rules
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Routes in priority order
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// Backend name to base URL
    #[serde(default)]
    pub backends: HashMap<String, String>,
}

impl PolicyDocument {
    /// The bookstore table shipped with the gateway.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_source(::config::File::from_str(
            BUILTIN_POLICY,
            ::config::FileFormat::Toml,
        ))
    }

    /// Reads a policy file; the format follows the extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_source(::config::File::from(path))
    }

    /// Parses a TOML policy held in memory.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Self::from_source(::config::File::from_str(source, ::config::FileFormat::Toml))
    }

    fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: ::config::Source + Send + Sync + 'static,
    {
        let document = ::config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Ok(document)
    }
}

/// Compiled, immutable policy shared by all requests.
#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    /// Path classifier
    pub classifier: PathClassifier,
    /// Backend routes
    pub routes: RouteTable,
}

impl GatewayPolicy {
    /// Loads the policy file when given, the built-in table otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let document = match path {
            Some(path) => PolicyDocument::from_file(path)?,
            None => PolicyDocument::builtin()?,
        };
        let policy = Self::compile(&document)?;

        info!(
            source = %path.map_or_else(|| "builtin".into(), |p| p.display().to_string()),
            rules = policy.classifier.len(),
            routes = policy.routes.len(),
            "Gateway policy loaded"
        );
        Ok(policy)
    }

    /// Compiles and validates a policy document.
    pub fn compile(document: &PolicyDocument) -> Result<Self, ConfigError> {
        let rules = document
            .rules
            .iter()
            .map(RuleSpec::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let classifier = PathClassifier::new(rules, document.privileged_segment.clone())?;

        let backends = document
            .backends
            .iter()
            .map(|(name, raw)| {
                Url::parse(raw)
                    .map(|url| (name.clone(), url))
                    .map_err(|e| ConfigError::InvalidUrl {
                        field: format!("backends.{name}"),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let routes: Vec<(String, Vec<String>)> = document
            .routes
            .iter()
            .map(|r| (r.backend.clone(), r.paths.clone()))
            .collect();
        let routes = RouteTable::new(&routes, &backends)?;

        Ok(Self { classifier, routes })
    }
}

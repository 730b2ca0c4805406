//! The unit handed downstream: one discovered repository location.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version control system of a mentioned repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    #[default]
    Git,
}

impl Vcs {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Vcs::Git => "git",
        }
    }
}

impl std::fmt::Display for Vcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered reference to a remote repository.
///
/// Serializes to the downstream wire shape:
/// `{provider, endpoint, vcs, isFork, aliases, context}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    /// Name of the provider that produced this mention.
    pub provider: String,
    /// Canonical clone URL.
    pub endpoint: String,
    pub vcs: Vcs,
    /// `None` unless the source reports fork status.
    pub is_fork: Option<bool>,
    /// Equivalent clone URLs, canonical included.
    pub aliases: Vec<String>,
    /// Source-specific metadata.
    pub context: BTreeMap<String, String>,
}

impl Mention {
    pub fn new(provider: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            endpoint: endpoint.into(),
            vcs: Vcs::Git,
            is_fork: None,
            aliases: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    #[must_use]
    pub fn with_fork(mut self, is_fork: Option<bool>) -> Self {
        self.is_fork = is_fork;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

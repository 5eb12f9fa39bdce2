//! Attribute suppression for discovered targets.

use regex::Regex;
use std::collections::BTreeMap;

/// Compiled attribute-exclusion rules for efficient matching.
///
/// A pattern is either an exact attribute key or a key with `*` wildcards,
/// e.g. `kong.route.*`.
#[derive(Debug, Clone, Default)]
pub struct AttributeExcludes {
    matchers: Vec<KeyMatcher>,
}

#[derive(Debug, Clone)]
enum KeyMatcher {
    Exact(String),
    Wildcard(Regex),
}

impl AttributeExcludes {
    /// Compile exclusion patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let matchers = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Check if an attribute key is excluded.
    pub fn matches(&self, key: &str) -> bool {
        self.matchers.iter().any(|matcher| match matcher {
            KeyMatcher::Exact(s) => key == s,
            KeyMatcher::Wildcard(r) => r.is_match(key),
        })
    }

    /// Drop every excluded key from the attribute map.
    pub fn apply(&self, attributes: &mut BTreeMap<String, Vec<String>>) {
        if self.is_empty() {
            return;
        }
        attributes.retain(|key, _| !self.matches(key));
    }
}

fn compile(pattern: &str) -> Result<KeyMatcher, regex::Error> {
    if !pattern.contains('*') {
        return Ok(KeyMatcher::Exact(pattern.to_string()));
    }
    let escaped = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", escaped)).map(KeyMatcher::Wildcard)
}

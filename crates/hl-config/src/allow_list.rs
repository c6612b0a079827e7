use serde::Deserialize;
use wildmatch::WildMatch;

/// Page filtering rules, deserialized from `[allow_list]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AllowListConfig {
    /// Wildcard patterns (`*`, `?`) matched against page identities. A page
    /// matching any pattern is excluded from query results.
    pub deny: Vec<String>,
}

impl AllowListConfig {
    pub fn compile(&self) -> DenyPatterns {
        DenyPatterns::new(&self.deny)
    }
}

// ---------------------------------------------------------------------------
// DenyPatterns: compiled wildcard matcher
// ---------------------------------------------------------------------------

/// A set of wildcard patterns compiled from the `deny` list.
#[derive(Debug, Clone)]
pub struct DenyPatterns {
    patterns: Vec<String>,
    compiled: Vec<WildMatch>,
}

impl DenyPatterns {
    pub fn new(patterns: &[String]) -> Self {
        let compiled = patterns.iter().map(|p| WildMatch::new(p)).collect();
        Self {
            patterns: patterns.to_vec(),
            compiled,
        }
    }

    /// Returns `true` if any pattern matches `page`.
    pub fn is_denied(&self, page: &str) -> bool {
        self.compiled.iter().any(|p| p.matches(page))
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn raw_patterns(&self) -> &[String] {
        &self.patterns
    }
}

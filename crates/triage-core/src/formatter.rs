//! Provider-specific prompt formatting.
//!
//! Some embedding families are trained with an instruction or role prefix
//! (BGE expects an instruction, E5 expects `passage: `). The formatter keeps
//! an ordered list of `(predicate, prefix)` rules; the first rule whose
//! predicate matches the provider id wins. Prototypes and inputs must go
//! through the same formatter so both live in the same instruction space.

use std::borrow::Cow;
use std::fmt;

use crate::ProviderId;

/// Instruction prefix for BGE retrieval models.
pub const BGE_PREFIX: &str = "Represent this sentence for classification: ";
/// Role prefix for E5 dual encoders.
pub const E5_PREFIX: &str = "passage: ";

type Predicate = Box<dyn Fn(&ProviderId) -> bool + Send + Sync>;

struct PrefixRule {
    name: String,
    matches: Predicate,
    prefix: String,
}

/// Ordered, first-match-wins table of provider family prefixes.
pub struct TextFormatter {
    rules: Vec<PrefixRule>,
}

impl TextFormatter {
    /// A formatter with no rules: every text passes through unchanged.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. Earlier rules take precedence.
    pub fn register<F>(&mut self, name: impl Into<String>, matches: F, prefix: impl Into<String>)
    where
        F: Fn(&ProviderId) -> bool + Send + Sync + 'static,
    {
        self.rules.push(PrefixRule {
            name: name.into(),
            matches: Box::new(matches),
            prefix: prefix.into(),
        });
    }

    /// Append a rule matching provider ids that contain `needle`.
    pub fn register_contains(&mut self, needle: impl Into<String>, prefix: impl Into<String>) {
        let needle = needle.into();
        let name = needle.clone();
        self.register(name, move |id| id.as_str().contains(&needle), prefix);
    }

    /// Prefix that applies to `provider`, if any.
    pub fn prefix_for(&self, provider: &ProviderId) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(provider))
            .map(|rule| rule.prefix.as_str())
    }

    /// The exact string to embed for `text` under `provider`.
    pub fn format<'a>(&self, provider: &ProviderId, text: &'a str) -> Cow<'a, str> {
        match self.prefix_for(provider) {
            Some(prefix) => Cow::Owned(format!("{prefix}{text}")),
            None => Cow::Borrowed(text),
        }
    }

    /// Rule names in precedence order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        let mut formatter = Self::empty();
        formatter.register_contains("bge", BGE_PREFIX);
        formatter.register_contains("e5", E5_PREFIX);
        formatter
    }
}

impl fmt::Debug for TextFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| (&r.name, &r.prefix)))
            .finish()
    }
}

//! Option resolution: merging defaults, board data, job options and per-stage
//! overrides into one map.

use crate::error::ConfigError;
use kiln_common::{OptionMap, OptionValue};
use std::collections::BTreeMap;

/// The scope an option value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// A flow or tool default.
    Default,
    /// The external board lookup database.
    Database,
    /// Supplied by the job.
    Job,
    /// An explicit override on one stage of a chain.
    Node,
}

/// An option value tagged with the scope that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedValue {
    /// The value.
    pub value: OptionValue,
    /// Where the value came from.
    pub scope: Scope,
}

/// The merged option map for one build (or one stage of it).
///
/// A value from a higher [`Scope`] always wins over a lower one, whatever
/// order the scopes are merged in. Within one scope the last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOptions {
    entries: BTreeMap<String, ScopedValue>,
}

impl ResolvedOptions {
    /// Creates an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value unless a higher scope already supplied the key.
    ///
    /// Returns `true` if the value was stored.
    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue, scope: Scope) -> bool {
        let key = key.into();
        match self.entries.get(&key) {
            Some(existing) if existing.scope > scope => false,
            _ => {
                self.entries.insert(key, ScopedValue { value, scope });
                true
            }
        }
    }

    /// Merges every entry of `options` at the given scope.
    pub fn merge_scope(&mut self, scope: Scope, options: &OptionMap) {
        for (key, value) in options {
            self.insert(key.clone(), value.clone(), scope);
        }
    }

    /// Returns a copy of this map with `options` merged at `scope`.
    pub fn layered(&self, scope: Scope, options: &OptionMap) -> Self {
        let mut copy = self.clone();
        copy.merge_scope(scope, options);
        copy
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Returns the scope that supplied `key`, if present.
    pub fn scope_of(&self, key: &str) -> Option<Scope> {
        self.entries.get(key).map(|e| e.scope)
    }

    /// Returns `true` if `key` is present and not blank.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_blank())
    }

    /// Returns the value for `key`, failing if it is absent or blank.
    pub fn require(&self, key: &str) -> Result<&OptionValue, ConfigError> {
        match self.get(key) {
            Some(value) if !value.is_blank() => Ok(value),
            _ => Err(ConfigError::MissingRequiredOption {
                key: key.to_string(),
            }),
        }
    }

    /// Returns the string value for `key`, failing if it is absent, blank, or
    /// not a string.
    pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| ConfigError::InvalidOption {
            key: key.to_string(),
            expected: "string",
            found: value.type_name(),
        })
    }

    /// Returns the string value for `key` if present and not blank.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        if !self.is_set(key) {
            return Ok(None);
        }
        self.require_str(key).map(Some)
    }

    /// Returns the boolean value for `key`, `false` when absent.
    pub fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(false),
            Some(value) => value.as_bool().ok_or_else(|| ConfigError::InvalidOption {
                key: key.to_string(),
                expected: "boolean",
                found: value.type_name(),
            }),
        }
    }

    /// Returns the value for `key` split into command-line words, empty when
    /// absent.
    pub fn words(&self, key: &str) -> Vec<String> {
        self.get(key).map(OptionValue::to_words).unwrap_or_default()
    }

    /// Checks that every key in `required` is present and not blank.
    pub fn check_required(&self, required: &[&str]) -> Result<(), ConfigError> {
        required.iter().try_for_each(|key| self.require(key).map(|_| ()))
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScopedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves the option map for one build.
///
/// Precedence is `defaults < external < job`; keys in `required` must be
/// present and non-blank after merging. Pure: reads only its arguments.
pub fn resolve(
    defaults: &OptionMap,
    external: &OptionMap,
    job: &OptionMap,
    required: &[&str],
) -> Result<ResolvedOptions, ConfigError> {
    let mut resolved = ResolvedOptions::new();
    resolved.merge_scope(Scope::Default, defaults);
    resolved.merge_scope(Scope::Database, external);
    resolved.merge_scope(Scope::Job, job);
    resolved.check_required(required)?;
    Ok(resolved)
}

//! Option values carried through configuration scopes and tool stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An ordered map from option key to value.
///
/// Ordered so that every traversal, and therefore every generated script, is
/// deterministic.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// A single option value as written in a job file or board database.
///
/// Deserialized untagged, so `true`, `16`, `"xc7a35t"` and `["-a", "-b"]` all
/// map onto the natural variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// A boolean switch.
    Bool(bool),
    /// An integer (e.g. a channel width).
    Int(i64),
    /// A plain string.
    Str(String),
    /// A list of strings, typically extra command-line arguments.
    List(Vec<String>),
}

impl OptionValue {
    /// Returns the string if this is a [`OptionValue::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`OptionValue::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list if this is a [`OptionValue::List`].
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` for an empty string or an empty list.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Str(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Int(_) => false,
        }
    }

    /// Returns a short name for the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }

    /// Splits the value into command-line words.
    ///
    /// A string becomes a single word (none if blank), a list keeps its items,
    /// and scalars are rendered with [`Display`](fmt::Display).
    pub fn to_words(&self) -> Vec<String> {
        match self {
            Self::Str(s) if s.trim().is_empty() => Vec::new(),
            Self::List(items) => items.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl<const N: usize> From<[&str; N]> for OptionValue {
    fn from(items: [&str; N]) -> Self {
        Self::List(items.iter().map(|s| s.to_string()).collect())
    }
}

/// Builds an [`OptionMap`] from key/value pairs.
pub fn option_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> OptionMap
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_deserialize() {
        let map: OptionMap = serde_json::from_str(
            r#"{"flag": true, "width": 16, "part": "xc7a35t", "args": ["-a", "-b"]}"#,
        )
        .unwrap();
        assert_eq!(map["flag"], OptionValue::Bool(true));
        assert_eq!(map["width"], OptionValue::Int(16));
        assert_eq!(map["part"].as_str(), Some("xc7a35t"));
        assert_eq!(map["args"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn display_joins_lists() {
        assert_eq!(OptionValue::from(["--pack", "--place"]).to_string(), "--pack --place");
        assert_eq!(OptionValue::from(false).to_string(), "false");
        assert_eq!(OptionValue::from(500_i64).to_string(), "500");
    }

    #[test]
    fn blank_values() {
        assert!(OptionValue::from("").is_blank());
        assert!(OptionValue::from("   ").is_blank());
        assert!(OptionValue::List(Vec::new()).is_blank());
        assert!(!OptionValue::from(false).is_blank());
        assert!(!OptionValue::from("x").is_blank());
    }

    #[test]
    fn words_from_each_variant() {
        assert!(OptionValue::from("").to_words().is_empty());
        assert_eq!(OptionValue::from("--disp on").to_words(), vec!["--disp on"]);
        assert_eq!(OptionValue::from(["a", "b"]).to_words(), vec!["a", "b"]);
        assert_eq!(OptionValue::from(3_i64).to_words(), vec!["3"]);
    }

    #[test]
    fn type_names() {
        assert_eq!(OptionValue::from(true).type_name(), "boolean");
        assert_eq!(OptionValue::from(1_i64).type_name(), "integer");
        assert_eq!(OptionValue::from("s").type_name(), "string");
        assert_eq!(OptionValue::from(["s"]).type_name(), "list");
    }

    #[test]
    fn option_map_builder_is_ordered() {
        let map = option_map([("pnr", "vpr"), ("board", "basys3")]);
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["board", "pnr"]);
    }
}

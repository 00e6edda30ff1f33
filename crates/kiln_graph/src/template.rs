//! Generation-time placeholder expansion.
//!
//! A placeholder is `@NAME@` where `NAME` is one or more of `A-Z`, `0-9`
//! and `_`. `@@` stands for a literal `@`. Any other `@` is copied as is, so
//! e-mail addresses and Tcl `@` syntax survive. Execution-time placeholders
//! (`${NAME}`, `$(...)`) are never interpreted.

use crate::error::FlowError;
use std::collections::BTreeMap;

/// Returns `true` if `name` is a valid placeholder name.
pub fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

/// Length of the placeholder name starting at `rest`, if `rest` begins with
/// `NAME@`.
fn placeholder_len(rest: &str) -> Option<usize> {
    let end = rest.find('@')?;
    is_placeholder_name(&rest[..end]).then_some(end)
}

/// Substitutes every `@NAME@` in `text` with its binding.
///
/// Values are inserted verbatim; a value containing `@NAME@` is not expanded
/// again. An unbound name fails with [`FlowError::UndefinedVariable`]
/// naming `referrer`.
pub fn expand(
    text: &str,
    vars: &BTreeMap<String, String>,
    referrer: &str,
) -> Result<String, FlowError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        if let Some(tail) = after.strip_prefix('@') {
            out.push('@');
            rest = tail;
            continue;
        }
        match placeholder_len(after) {
            Some(len) => {
                let name = &after[..len];
                let value = vars.get(name).ok_or_else(|| FlowError::UndefinedVariable {
                    name: name.to_string(),
                    referrer: referrer.to_string(),
                })?;
                out.push_str(value);
                rest = &after[len + 1..];
            }
            None => {
                out.push('@');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_names() {
        let v = vars(&[("TOP", "blinky"), ("EXT", "net")]);
        assert_eq!(expand("@TOP@.@EXT@", &v, "t").unwrap(), "blinky.net");
    }

    #[test]
    fn leaves_execution_time_placeholders() {
        let v = vars(&[("PART", "xc7a35t")]);
        assert_eq!(
            expand("${DBROOT}/@PART@/$(notdir x)", &v, "t").unwrap(),
            "${DBROOT}/xc7a35t/$(notdir x)"
        );
    }

    #[test]
    fn double_at_is_literal() {
        assert_eq!(expand("a@@b", &BTreeMap::new(), "t").unwrap(), "a@b");
        assert_eq!(expand("@@TOP@@", &BTreeMap::new(), "t").unwrap(), "@TOP@");
    }

    #[test]
    fn lone_at_is_literal() {
        let empty = BTreeMap::new();
        assert_eq!(expand("user@host", &empty, "t").unwrap(), "user@host");
        assert_eq!(expand("trailing@", &empty, "t").unwrap(), "trailing@");
        assert_eq!(expand("@lower@", &empty, "t").unwrap(), "@lower@");
    }

    #[test]
    fn values_are_not_reexpanded() {
        let v = vars(&[("A", "@B@"), ("B", "x")]);
        assert_eq!(expand("@A@", &v, "t").unwrap(), "@B@");
    }

    #[test]
    fn undefined_variable() {
        let err = expand("@MISSING@", &BTreeMap::new(), "yosys#0.0").unwrap_err();
        assert!(matches!(
            err,
            FlowError::UndefinedVariable { name, referrer } if name == "MISSING" && referrer == "yosys#0.0"
        ));
    }

    #[test]
    fn placeholder_names() {
        assert!(is_placeholder_name("UTILS_PATH"));
        assert!(is_placeholder_name("X2"));
        assert!(!is_placeholder_name(""));
        assert!(!is_placeholder_name("lower"));
        assert!(!is_placeholder_name("A-B"));
    }
}

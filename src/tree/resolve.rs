//! Scalar resolution and representation.
//!
//! Plain scalars resolve through the YAML 1.2 core schema as implemented by
//! `serde_yaml`; quoted scalars and `!!str` are always strings.

use super::node::{ScalarNode, ScalarStyle};
use crate::value::{format_float, Value};

/// Normalizes the core schema tags to their short name (`str`, `int`, ...).
fn core_tag(tag: &str) -> Option<&str> {
    let name = tag
        .strip_prefix("!!")
        .or_else(|| tag.strip_prefix("tag:yaml.org,2002:"))
        .or_else(|| {
            tag.strip_prefix("!<tag:yaml.org,2002:")
                .and_then(|t| t.strip_suffix('>'))
        })?;
    match name {
        "str" | "int" | "float" | "bool" | "null" => Some(name),
        _ => None,
    }
}

fn is_null_text(text: &str) -> bool {
    matches!(text, "" | "~" | "null" | "Null" | "NULL")
}

/// Resolves plain scalar text.
pub fn resolve_plain(text: &str) -> Value {
    if is_null_text(text) {
        return Value::Null;
    }
    match serde_yaml::from_str::<serde_yaml::Value>(text) {
        Ok(v @ serde_yaml::Value::Bool(_)) | Ok(v @ serde_yaml::Value::Number(_)) => Value::from(v),
        _ => Value::String(text.to_string()),
    }
}

/// Resolves a scalar node, honoring an explicit core schema tag.
pub fn resolve_scalar(scalar: &ScalarNode, tag: Option<&str>) -> Value {
    match tag.and_then(core_tag) {
        Some("str") => return Value::String(scalar.text.clone()),
        Some("null") => return Value::Null,
        Some("float") => {
            return match resolve_plain(&scalar.text) {
                Value::Int(i) => Value::Float(i as f64),
                other => other,
            }
        }
        Some(_) => return resolve_plain(&scalar.text),
        None => {}
    }

    match scalar.style {
        ScalarStyle::Plain => resolve_plain(&scalar.text),
        ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted => {
            Value::String(scalar.text.clone())
        }
    }
}

fn needs_double_quotes(text: &str) -> bool {
    text.chars().any(|c| c.is_control() || c == '\u{feff}')
}

/// Returns true if `text` can be written as a plain scalar without being
/// misread as another construct.
pub fn plain_is_safe(text: &str, flow: bool) -> bool {
    if text.is_empty() || text.trim() != text || needs_double_quotes(text) {
        return false;
    }

    let mut chars = text.chars();
    let first = chars.next().unwrap_or(' ');
    let second = chars.next();
    if "[]{},#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if "-?:".contains(first) && second.map_or(true, char::is_whitespace) {
        return false;
    }
    if text == "<<" || text.starts_with("---") || text.starts_with("...") {
        return false;
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return false;
    }
    if flow && text.contains(|c: char| ",[]{}".contains(c)) {
        return false;
    }
    true
}

/// Quotes `text` with single quotes.
pub fn single_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Quotes `text` with double quotes, escaping as needed.
pub fn double_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() || c == '\u{feff}' => {
                let code = c as u32;
                if code <= 0xff {
                    out.push_str(&format!("\\x{:02x}", code));
                } else {
                    out.push_str(&format!("\\u{:04x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Builds a fresh scalar for `value`; returns None for collections.
///
/// Strings stay plain only if they read back as the same string.
pub fn represent(value: &Value) -> Option<ScalarNode> {
    let scalar = match value {
        Value::Null => ScalarNode::plain("null"),
        Value::Bool(b) => ScalarNode::plain(b.to_string()),
        Value::Int(i) => ScalarNode::plain(i.to_string()),
        Value::Float(f) => ScalarNode::plain(format_float(*f)),
        Value::String(s) => {
            if plain_is_safe(s, false) && resolve_plain(s) == *value {
                ScalarNode::plain(s.clone())
            } else if needs_double_quotes(s) {
                ScalarNode::with_style(s.clone(), ScalarStyle::DoubleQuoted)
            } else {
                ScalarNode::with_style(s.clone(), ScalarStyle::SingleQuoted)
            }
        }
        Value::List(_) | Value::Map(_) | Value::Ref(_) => return None,
    };
    Some(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plain_core_schema() {
        assert_eq!(resolve_plain(""), Value::Null);
        assert_eq!(resolve_plain("~"), Value::Null);
        assert_eq!(resolve_plain("true"), Value::Bool(true));
        assert_eq!(resolve_plain("5"), Value::Int(5));
        assert_eq!(resolve_plain("99.2"), Value::Float(99.2));
        assert_eq!(resolve_plain("an actual string"), Value::from("an actual string"));
        assert_eq!(resolve_plain("---"), Value::from("---"));
    }

    #[test]
    fn test_quoted_and_tagged() {
        let quoted = ScalarNode::with_style("1", ScalarStyle::SingleQuoted);
        assert_eq!(resolve_scalar(&quoted, None), Value::from("1"));

        let plain = ScalarNode::plain("12");
        assert_eq!(resolve_scalar(&plain, Some("!!str")), Value::from("12"));
        assert_eq!(resolve_scalar(&plain, Some("!!float")), Value::Float(12.0));
        assert_eq!(resolve_scalar(&plain, Some("!custom")), Value::Int(12));
    }

    #[test]
    fn test_represent_quotes_ambiguous_strings() {
        assert_eq!(represent(&Value::from("1")).unwrap().style, ScalarStyle::SingleQuoted);
        assert_eq!(represent(&Value::from("true")).unwrap().style, ScalarStyle::SingleQuoted);
        assert_eq!(represent(&Value::from("a: b")).unwrap().style, ScalarStyle::SingleQuoted);
        assert_eq!(represent(&Value::from("tab\there")).unwrap().style, ScalarStyle::DoubleQuoted);
        assert_eq!(represent(&Value::from("Possum")).unwrap().style, ScalarStyle::Plain);
        assert_eq!(represent(&Value::Float(42.42)).unwrap().text, "42.42");
        assert!(represent(&Value::List(vec![])).is_none());
    }

    #[test]
    fn test_plain_safety_in_flow() {
        assert!(plain_is_safe("a,b", false));
        assert!(!plain_is_safe("a,b", true));
        assert!(plain_is_safe("-5", true));
        assert!(!plain_is_safe("- 5", false));
        assert!(!plain_is_safe("<<", false));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(single_quote("it's"), "'it''s'");
        assert_eq!(double_quote("a\"b\n"), "\"a\\\"b\\n\"");
    }
}

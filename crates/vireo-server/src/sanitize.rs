use serde_json::{Map, Value};

// Trim, drop control characters, escape HTML-significant characters. Applied to
// every string on the way in so stored values are safe to echo into markup.
pub fn clean_str(input: &str) -> String {
    let trimmed = input.trim();
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        if ch.is_control() && ch != '\n' && ch != '\t' {
            continue;
        }
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn clean_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(clean_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), clean_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

// Copy of the input restricted to `allowed` keys (when given), with every value
// passed through the sanitizer.
pub fn clean_map(data: &Map<String, Value>, allowed: Option<&[&str]>) -> Map<String, Value> {
    data.iter()
        .filter(|(key, _)| allowed.is_none_or(|list| list.contains(&key.as_str())))
        .map(|(key, value)| (key.clone(), clean_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_and_trims() {
        assert_eq!(clean_str("  <b>hi</b>  "), "&lt;b&gt;hi&lt;/b&gt;");
        assert_eq!(clean_str("a & b"), "a &amp; b");
        assert_eq!(clean_str("it's \"fine\""), "it&#39;s &quot;fine&quot;");
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(clean_str("a\u{0}b\u{7}c"), "abc");
        // Newlines and tabs survive.
        assert_eq!(clean_str("a\nb\tc"), "a\nb\tc");
    }

    #[test]
    fn allow_list_filters_keys() {
        let data: Map<String, Value> =
            serde_json::from_str(r#"{"name": "Acme", "role": "admin", "city": "Porto"}"#).unwrap();
        let cleaned = clean_map(&data, Some(&["name", "city"]));
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.contains_key("name"));
        assert!(cleaned.contains_key("city"));
        assert!(!cleaned.contains_key("role"));
    }

    #[test]
    fn no_allow_list_keeps_everything() {
        let data: Map<String, Value> =
            serde_json::from_str(r#"{"a": "<x>", "b": 2}"#).unwrap();
        let cleaned = clean_map(&data, None);
        assert_eq!(cleaned.get("a"), Some(&Value::String("&lt;x&gt;".into())));
        assert_eq!(cleaned.get("b"), Some(&Value::from(2)));
    }

    #[test]
    fn nested_values_are_cleaned() {
        let data: Map<String, Value> =
            serde_json::from_str(r#"{"tags": ["<a>", " b "], "meta": {"note": "<i>"}}"#).unwrap();
        let cleaned = clean_map(&data, None);
        assert_eq!(cleaned["tags"][0], "&lt;a&gt;");
        assert_eq!(cleaned["tags"][1], "b");
        assert_eq!(cleaned["meta"]["note"], "&lt;i&gt;");
    }
}

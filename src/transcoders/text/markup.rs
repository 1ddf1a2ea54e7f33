//! XML and HTML emission helpers

use serde_json::Value;

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// turns an arbitrary key into a usable element name
///
/// characters outside `[A-Za-z0-9_-]` become `_`, as does a leading digit or
/// hyphen; an empty key becomes `field`
pub fn xml_tag(key: &str) -> String {
    let mut tag: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();

    if tag.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        tag.replace_range(..1, "_");
    }

    if tag.is_empty() { "field".to_string() } else { tag }
}

/// renders a JSON value as nested elements; array items become `<item>`
pub fn json_to_xml(value: &Value, tag: &str) -> String {
    match value {
        Value::Null => format!("<{}/>", tag),
        Value::Array(items) => {
            let inner = items
                .iter()
                .map(|item| json_to_xml(item, "item"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("<{tag}>\n{inner}\n</{tag}>")
        }
        Value::Object(map) => {
            let inner = map
                .iter()
                .map(|(key, v)| json_to_xml(v, &xml_tag(key)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("<{tag}>\n{inner}\n</{tag}>")
        }
        Value::String(s) => format!("<{tag}>{}</{tag}>", escape_xml(s)),
        other => format!("<{tag}>{}</{tag}>", escape_xml(&other.to_string())),
    }
}

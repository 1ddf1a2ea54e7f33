//! narrow, substitution-based Markdown handling
//!
//! Headings (`#`..`###`), bold, italic, inline code and links are rewritten
//! in that order, then blank lines become paragraph breaks. Lists, block
//! quotes, nested emphasis and fenced code are not understood.

use regex_lite::Regex;
use std::sync::LazyLock;

static HTML_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?m)^### (.+)$", "<h3>$1</h3>"),
        (r"(?m)^## (.+)$", "<h2>$1</h2>"),
        (r"(?m)^# (.+)$", "<h1>$1</h1>"),
        (r"\*\*([^*]+)\*\*", "<strong>$1</strong>"),
        (r"\*([^*]+)\*", "<em>$1</em>"),
        (r"`([^`]+)`", "<code>$1</code>"),
        (r"\[([^\]]+)\]\(([^)]+)\)", "<a href=\"$2\">$1</a>"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("static markdown pattern"), replacement))
    .collect()
});

static STRIP_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?m)^#{1,6}\s+", ""),
        (r"\*\*([^*]+)\*\*", "$1"),
        (r"\*([^*]+)\*", "$1"),
        (r"`([^`]+)`", "$1"),
        (r"\[([^\]]+)\]\([^)]+\)", "$1"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("static markdown pattern"), replacement))
    .collect()
});

fn apply(rules: &[(Regex, &'static str)], text: &str) -> String {
    rules.iter().fold(text.to_string(), |acc, (re, replacement)| {
        re.replace_all(&acc, *replacement).into_owned()
    })
}

/// renders Markdown to an HTML fragment; inline HTML passes through untouched
pub fn to_html(markdown: &str) -> String {
    let inline = apply(&HTML_RULES, markdown);
    format!("<p>{}</p>", inline.replace("\n\n", "</p><p>"))
}

/// removes heading markers, emphasis, code ticks and link syntax
pub fn strip(markdown: &str) -> String {
    apply(&STRIP_RULES, markdown)
}

pub mod csv;
pub mod markdown;
pub mod markup;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::errors::ConvertError;
use crate::progress::ProgressReporter;
use crate::transcoders::fallback_target;

use self::markup::{escape_html, escape_xml, json_to_xml, xml_tag};

/// declared media types routed to this pipeline
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "text/plain",
    "text/csv",
    "text/markdown",
    "application/json",
    "text/html",
    "application/xml",
    "text/xml",
];

/// extensions recognized when the media type is missing or unknown
pub const EXTENSIONS: &[&str] = &["txt", "csv", "json", "md", "html", "xml", "yaml", "yml"];

const TARGETS: &[&str] = &["txt", "md", "json", "csv", "html", "xml"];

const HTML_DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Converted Document</title>
  <style>
    body { font-family: system-ui, sans-serif; padding: 20px; max-width: 800px; margin: 0 auto; }
    table { border-collapse: collapse; width: 100%; }
    th, td { padding: 8px; text-align: left; border: 1px solid #ddd; }
    th { background: #f5f5f5; }
    pre { background: #f5f5f5; padding: 16px; overflow-x: auto; }
    code { background: #f0f0f0; padding: 2px 4px; }
  </style>
</head>
<body>
"#;

const HTML_DOCUMENT_TAIL: &str = "\n</body>\n</html>";

const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// how the source text is interpreted; anything unrecognized is plain text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Plain,
    Markdown,
    Json,
    Csv,
    Html,
    Xml,
}

impl Dialect {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "md" => Dialect::Markdown,
            "json" => Dialect::Json,
            "csv" => Dialect::Csv,
            "html" => Dialect::Html,
            "xml" => Dialect::Xml,
            _ => Dialect::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTarget {
    Plain,
    Markdown,
    Json,
    Csv,
    Html,
    Xml,
}

impl TextTarget {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(TextTarget::Plain),
            "md" => Some(TextTarget::Markdown),
            "json" => Some(TextTarget::Json),
            "csv" => Some(TextTarget::Csv),
            "html" => Some(TextTarget::Html),
            "xml" => Some(TextTarget::Xml),
            _ => None,
        }
    }
}

pub fn available_formats(source_ext: &str) -> Vec<&'static str> {
    let source = source_ext.to_ascii_lowercase();
    TARGETS.iter().copied().filter(|f| *f != source).collect()
}

/// decodes `data` as UTF-8 text and rewrites it from `source_ext`'s dialect into `target`
pub fn convert(
    data: &[u8],
    source_ext: &str,
    target: &str,
    progress: &ProgressReporter,
) -> Result<Vec<u8>, ConvertError> {
    let dialect = Dialect::from_extension(source_ext);
    let target = TextTarget::from_extension(target)
        .unwrap_or_else(|| fallback_target("Text", target, TextTarget::Plain));

    info!("Text pipeline: {:?} -> {:?} ({} bytes)", dialect, target, data.len());
    progress.report(20.0);

    let text = decode_text(data);
    progress.report(50.0);

    let output = match target {
        TextTarget::Json => to_json(&text, dialect)?,
        TextTarget::Csv => to_csv(&text, dialect)?,
        TextTarget::Markdown => to_markdown(&text, dialect),
        TextTarget::Html => to_html(&text, dialect),
        TextTarget::Xml => to_xml(&text, dialect),
        TextTarget::Plain => to_plain_text(&text, dialect),
    };
    progress.report(90.0);

    let bytes = output.into_bytes();
    progress.report(100.0);

    debug!("Text pipeline: produced {} bytes", bytes.len());
    Ok(bytes)
}

/// lossy UTF-8 decode with the byte order mark dropped and line endings unified
fn decode_text(data: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(data);
    let text = decoded.strip_prefix('\u{feff}').unwrap_or(&*decoded);
    text.replace("\r\n", "\n")
}

fn lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// string values verbatim, null as empty, everything else as compact JSON
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_pretty_json(value: &Value) -> Result<String, ConvertError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ConvertError::Other(format!("Failed to serialize JSON: {}", e)))
}

pub fn to_json(text: &str, dialect: Dialect) -> Result<String, ConvertError> {
    let value = if dialect == Dialect::Csv {
        let mut records = csv::parse(text).into_iter();
        let header = records.next().unwrap_or_default();

        let rows = records
            .map(|record| {
                let object: Map<String, Value> = header
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (key.clone(), Value::String(record.get(i).cloned().unwrap_or_default())))
                    .collect();
                Value::Object(object)
            })
            .collect();
        Value::Array(rows)
    } else {
        let content = lines(text).into_iter().map(|l| Value::String(l.to_string())).collect();
        let mut object = Map::new();
        object.insert("content".to_string(), Value::Array(content));
        Value::Object(object)
    };

    to_pretty_json(&value)
}

/// JSON sources must parse; anything else becomes one escaped cell per line
pub fn to_csv(text: &str, dialect: Dialect) -> Result<String, ConvertError> {
    if dialect != Dialect::Json {
        return Ok(lines(text).into_iter().map(csv::escape).collect::<Vec<_>>().join("\n"));
    }

    let data: Value = serde_json::from_str(text)
        .map_err(|e| ConvertError::MalformedInput(format!("Invalid JSON: {}", e)))?;

    let rows = match &data {
        Value::Array(items) if matches!(items.first(), Some(Value::Object(_))) => {
            let header: Vec<String> = match items.first() {
                Some(Value::Object(first)) => first.keys().cloned().collect(),
                _ => Vec::new(),
            };

            let mut rows = vec![csv::join_row(&header)];
            rows.extend(items.iter().map(|item| {
                csv::join_row(header.iter().map(|key| item.get(key).map(cell_text).unwrap_or_default()))
            }));
            rows
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| csv::join_row([i.to_string(), cell_text(item)]))
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| csv::join_row([key.clone(), cell_text(value)]))
            .collect(),
        scalar => vec![csv::escape(&cell_text(scalar))],
    };

    Ok(rows.join("\n"))
}

pub fn to_markdown(text: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Csv => {
            let records = csv::parse(text);
            let Some((header, body)) = records.split_first() else {
                return String::new();
            };

            let table_row = |cells: &[String]| format!("| {} |", cells.join(" | "));
            let separator = format!("| {} |", vec!["---"; header.len()].join(" | "));

            let mut rows = vec![table_row(header), separator];
            rows.extend(body.iter().map(|r| table_row(r)));
            rows.join("\n")
        }
        Dialect::Json => match serde_json::from_str::<Value>(text) {
            Ok(value) => match to_pretty_json(&value) {
                Ok(pretty) => format!("```json\n{}\n```", pretty),
                Err(_) => text.to_string(),
            },
            Err(_) => text.to_string(),
        },
        _ => text.to_string(),
    }
}

pub fn to_html(text: &str, dialect: Dialect) -> String {
    let body = match dialect {
        Dialect::Csv => {
            let records = csv::parse(text);
            match records.split_first() {
                None => "<p>Empty file</p>".to_string(),
                Some((header, rows)) => {
                    let header_cells: String =
                        header.iter().map(|h| format!("<th>{}</th>", escape_html(h))).collect();
                    let body_rows = rows
                        .iter()
                        .map(|row| {
                            let cells: String = row.iter().map(|v| format!("<td>{}</td>", escape_html(v))).collect();
                            format!("<tr>{}</tr>", cells)
                        })
                        .collect::<Vec<_>>()
                        .join("\n    ");
                    format!(
                        "<table border=\"1\">\n  <thead><tr>{}</tr></thead>\n  <tbody>{}</tbody>\n</table>",
                        header_cells, body_rows
                    )
                }
            }
        }
        Dialect::Markdown => markdown::to_html(text),
        _ => format!("<pre>{}</pre>", escape_html(text)),
    };

    format!("{}{}{}", HTML_DOCUMENT_HEAD, body, HTML_DOCUMENT_TAIL)
}

pub fn to_xml(text: &str, dialect: Dialect) -> String {
    let content = match dialect {
        Dialect::Json => match serde_json::from_str::<Value>(text) {
            Ok(value) => json_to_xml(&value, "root"),
            Err(_) => format!("<root><content>{}</content></root>", escape_xml(text)),
        },
        Dialect::Csv => {
            let records = csv::parse(text);
            match records.split_first() {
                None => "<root></root>".to_string(),
                Some((header, rows)) => {
                    let tags: Vec<String> = header.iter().map(|h| xml_tag(h)).collect();
                    let rows = rows
                        .iter()
                        .map(|row| {
                            let cells = tags
                                .iter()
                                .enumerate()
                                .map(|(i, tag)| {
                                    let value = row.get(i).map(String::as_str).unwrap_or("");
                                    format!("    <{tag}>{}</{tag}>", escape_xml(value))
                                })
                                .collect::<Vec<_>>()
                                .join("\n");
                            format!("  <row>\n{}\n  </row>", cells)
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!("<root>\n{}\n</root>", rows)
                }
            }
        }
        _ => {
            let elements = lines(text)
                .into_iter()
                .enumerate()
                .map(|(i, line)| format!("  <line index=\"{}\">{}</line>", i + 1, escape_xml(line)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("<root>\n{}\n</root>", elements)
        }
    };

    format!("{}\n{}", XML_PROLOG, content)
}

pub fn to_plain_text(text: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Json => serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|value| to_pretty_json(&value).ok())
            .unwrap_or_else(|| text.to_string()),
        Dialect::Csv => csv::parse(text)
            .iter()
            .map(|record| record.join("\t"))
            .collect::<Vec<_>>()
            .join("\n"),
        Dialect::Markdown => markdown::strip(text),
        _ => text.to_string(),
    }
}

//! Editor snippet JSON interchange.
//!
//! A snippet file maps a name to `{prefix, body, scope, description}`; `body`
//! is an array of lines (a plain string is accepted on import).

use crate::error::Result;
use crate::fragment::Fragment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub prefix: String,
    pub body: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl From<&Fragment> for Snippet {
    fn from(fragment: &Fragment) -> Self {
        Self {
            prefix: fragment.prefix.clone(),
            body: fragment.body.split('\n').map(str::to_string).collect(),
            scope: fragment.scope.clone(),
            description: fragment.description.clone(),
        }
    }
}

pub fn export(fragments: &[Fragment]) -> BTreeMap<String, Snippet> {
    fragments
        .iter()
        .map(|f| (f.label.clone(), Snippet::from(f)))
        .collect()
}

pub fn write_snippets(snippets: &BTreeMap<String, Snippet>, out: &mut dyn Write) -> Result<()> {
    let mut buf = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut buf, snippets)?;
    buf.write_all(b"\n")?;
    buf.flush()?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::One(String::new())
    }
}

#[derive(Deserialize)]
struct SnippetRecord {
    #[serde(default)]
    prefix: OneOrMany,
    #[serde(default)]
    body: OneOrMany,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    description: String,
}

/// Parse one snippet document into fragments, sorted by name.
///
/// `//` and `/* */` comments are allowed. A prefix list keeps its first
/// entry.
pub fn parse_snippets(content: &str) -> Result<Vec<Fragment>> {
    let records: BTreeMap<String, SnippetRecord> =
        serde_json::from_str(&strip_json_comments(content))?;
    Ok(records
        .into_iter()
        .map(|(label, record)| {
            let mut fragment = Fragment::new(label);
            fragment.prefix = match record.prefix {
                OneOrMany::One(p) => p,
                OneOrMany::Many(p) => p.into_iter().next().unwrap_or_default(),
            };
            fragment.body = match record.body {
                OneOrMany::One(b) => b,
                OneOrMany::Many(lines) => lines.join("\n"),
            };
            fragment.scope = record.scope;
            fragment.description = record.description;
            fragment
        })
        .collect())
}

pub fn snippet_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "json" || e == "code-snippets")
        })
        .collect()
}

/// Fragments from a snippet file, or from every snippet file below a
/// directory. Unreadable files inside a directory are skipped with a warning.
pub fn import_path(path: &Path) -> Result<Vec<Fragment>> {
    if path.is_file() {
        return parse_snippets(&fs::read_to_string(path)?);
    }
    let mut fragments = Vec::new();
    for file in snippet_files(path) {
        let parsed = fs::read_to_string(&file)
            .map_err(Into::into)
            .and_then(|content| parse_snippets(&content));
        match parsed {
            Ok(mut v) => fragments.append(&mut v),
            Err(e) => tracing::warn!("Skipping {}: {e}", file.display()),
        }
    }
    Ok(fragments)
}

fn strip_json_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_splits_body_and_omits_empty_fields() {
        let mut fragment = Fragment::new("loop").with_body("for i in ${1:xs}:\n    pass");
        fragment.prefix = "fori".into();
        fragment.scope = "python".into();
        fragment.keywords = "not exported".into();

        let value = serde_json::to_value(export(&[fragment, Fragment::new("empty")])).unwrap();
        assert_eq!(
            value,
            json!({
                "empty": {"prefix": "", "body": [""]},
                "loop": {
                    "prefix": "fori",
                    "body": ["for i in ${1:xs}:", "    pass"],
                    "scope": "python"
                }
            })
        );
    }

    #[test]
    fn parse_accepts_strings_arrays_and_comments() {
        let content = r#"{
            // a comment with "quotes"
            "Print": {
                "prefix": ["pr", "print"],
                "body": ["print(${1:x})", "// not a comment"],
                "description": "Print /* kept */ it"
            },
            /* block */
            "Url": {"prefix": "url", "body": "https://example.org"}
        }"#;
        let fragments = parse_snippets(content).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].label, "Print");
        assert_eq!(fragments[0].prefix, "pr");
        assert_eq!(fragments[0].body, "print(${1:x})\n// not a comment");
        assert_eq!(fragments[0].description, "Print /* kept */ it");
        assert_eq!(fragments[1].body, "https://example.org");
        assert!(fragments[1].tags.is_empty());
    }

    #[test]
    fn import_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("python.json"),
            r#"{"a": {"prefix": "a", "body": "x"}}"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested").join("more.code-snippets"),
            r#"{"b": {"prefix": "b", "body": ["y"]}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        fs::write(dir.path().join("notes.txt"), "{}").unwrap();

        let mut labels: Vec<String> = import_path(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.label)
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn write_snippets_is_pretty_json() {
        let mut out = Vec::new();
        write_snippets(&export(&[Fragment::new("a").with_body("x")]), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["a"]["body"], json!(["x"]));
    }
}

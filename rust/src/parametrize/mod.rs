//! Turning a Python selection into a snippet template.
//!
//! Free variables of the selection become numbered placeholders
//! (`${1:name}`); the datatype variant also labels each placeholder with a
//! type from a [`TypeInferrer`].

pub mod cascade;
pub mod inference;
pub mod python;

use crate::error::{FragmentError, Result};
use serde::{Deserialize, Serialize};

pub use cascade::{Cascade, Draft, SelectionInput, Tier};
pub use inference::{InterpreterInferrer, StaticInferrer, TypeInferrer};

/// Zero-based position; `character` counts Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn new(start: Position, end: Position) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Selection spanning the whole of `source`.
    pub fn all(source: &str) -> Self {
        let lines: Vec<&str> = source.split('\n').collect();
        let last = lines.len() - 1;
        Self::new(
            Position::new(0, 0),
            Position::new(last, lines[last].chars().count()),
        )
    }

    /// Byte range of the selection in `source`, clamped to the document.
    pub fn byte_range(&self, source: &str) -> (usize, usize) {
        let start = byte_offset(source, self.start);
        let end = byte_offset(source, self.end);
        (start.min(end), start.max(end))
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        let (start, end) = self.byte_range(source);
        &source[start..end]
    }
}

fn byte_offset(source: &str, pos: Position) -> usize {
    let mut line_start = 0;
    for (i, line) in source.split_inclusive('\n').enumerate() {
        if i == pos.line {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let content = content.strip_suffix('\r').unwrap_or(content);
            let within = content
                .char_indices()
                .nth(pos.character)
                .map(|(b, _)| b)
                .unwrap_or(content.len());
            return line_start + within;
        }
        line_start += line.len();
    }
    source.len()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parametrization {
    pub body: String,
    pub placeholders: Vec<String>,
}

impl Parametrization {
    /// Placeholder metadata as stored on a fragment.
    pub fn placeholder_list(&self) -> String {
        self.placeholders.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedPlaceholder {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedParametrization {
    pub body: String,
    pub placeholders: Vec<TypedPlaceholder>,
}

impl TypedParametrization {
    pub fn placeholder_list(&self) -> String {
        self.placeholders
            .iter()
            .map(|p| format!("{}:{}", p.name, p.ty))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Rewrite the selected Python code into a template with one numbered
/// placeholder per free variable.
///
/// Fails with `NoPlaceholders` if the selection reads no free variable and
/// with `Syntax` if it does not parse.
pub fn parametrize(source: &str, selection: &Selection) -> Result<Parametrization> {
    let code = selection_code(source, selection);
    let free = python::free_variables(&code)?;
    if free.names.is_empty() {
        return Err(FragmentError::NoPlaceholders);
    }

    let mut body = String::with_capacity(code.len() + free.occurrences.len() * 6);
    let mut cursor = 0;
    for occurrence in &free.occurrences {
        push_escaped(&mut body, &code[cursor..occurrence.start]);
        let index = free
            .names
            .iter()
            .position(|n| n == &occurrence.name)
            .map(|i| i + 1)
            .unwrap_or_default();
        body.push_str(&format!("${{{index}:{}}}", occurrence.name));
        cursor = occurrence.end;
    }
    push_escaped(&mut body, &code[cursor..]);

    tracing::debug!(placeholders = ?free.names, "Parametrized selection");
    Ok(Parametrization {
        body,
        placeholders: free.names,
    })
}

/// [`parametrize`], then type every placeholder with `inferrer`.
///
/// The inferrer sees the document text before the selection. Fails with
/// `Execution` when it cannot type every placeholder.
pub fn parametrize_with_datatypes(
    source: &str,
    selection: &Selection,
    inferrer: &dyn TypeInferrer,
) -> Result<TypedParametrization> {
    let plain = parametrize(source, selection)?;
    let (start, _) = selection.byte_range(source);
    let types = inferrer.infer(&source[..start], &plain.placeholders)?;
    if types.len() != plain.placeholders.len() {
        return Err(FragmentError::Execution(format!(
            "expected {} types, got {}",
            plain.placeholders.len(),
            types.len()
        )));
    }
    Ok(TypedParametrization {
        body: plain.body,
        placeholders: plain
            .placeholders
            .into_iter()
            .zip(types)
            .map(|(name, ty)| TypedPlaceholder { name, ty })
            .collect(),
    })
}

/// Selected text with its common indentation removed.
///
/// When the selection starts after leading whitespace of its first line, that
/// whitespace counts as the first line's indentation.
fn selection_code(source: &str, selection: &Selection) -> String {
    let (start, end) = selection.byte_range(source);
    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let lead = &source[line_start..start];
    let text = if lead.chars().all(|c| c == ' ' || c == '\t') {
        &source[line_start..end]
    } else {
        &source[start..end]
    };
    dedent(text)
}

fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.trim_start_matches([' ', '\t'])
            } else {
                &line[indent..]
            }
        })
        .collect()
}

/// Snippet syntax treats `$` and `\` as special outside placeholders.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '$' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

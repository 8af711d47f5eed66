//! Free-variable analysis of Python code using tree-sitter-python.
//!
//! Binding rules are approximated for a single flat scope: a name bound
//! anywhere in the code (assignment target, loop or comprehension variable,
//! parameter, definition name, import, `as` target, walrus) is local for the
//! whole code, everything else that is read is free.

use crate::error::{FragmentError, Result};
use std::collections::HashSet;
use tree_sitter::{Node, Parser, Tree};

/// Names never turned into placeholders.
const BUILTINS: &[&str] = &[
    "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool", "breakpoint", "bytearray",
    "bytes", "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "filter", "float", "format", "frozenset", "getattr",
    "globals", "hasattr", "hash", "help", "hex", "id", "input", "int", "isinstance",
    "issubclass", "iter", "len", "list", "locals", "map", "max", "memoryview", "min", "next",
    "object", "oct", "open", "ord", "pow", "print", "property", "range", "repr", "reversed",
    "round", "set", "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super",
    "tuple", "type", "vars", "zip", "__import__", "__name__", "__file__", "__doc__",
    "NotImplemented", "Ellipsis", "BaseException", "Exception", "ArithmeticError",
    "AssertionError", "AttributeError", "EOFError", "FileExistsError", "FileNotFoundError",
    "ImportError", "IndexError", "IOError", "KeyError", "KeyboardInterrupt", "LookupError",
    "ModuleNotFoundError", "NameError", "NotImplementedError", "OSError", "OverflowError",
    "PermissionError", "RecursionError", "RuntimeError", "StopIteration", "SyntaxError",
    "SystemExit", "TimeoutError", "TypeError", "UnicodeDecodeError", "UnicodeEncodeError",
    "ValueError", "ZeroDivisionError", "Warning", "DeprecationWarning", "UserWarning",
    "self", "cls",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Load,
    Store,
    Params,
    Skip,
}

/// One identifier occurrence that reads a free name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeVariables {
    /// Free names in order of first appearance.
    pub names: Vec<String>,
    /// Byte ranges (into the analysed code) of every read of a free name.
    pub occurrences: Vec<Occurrence>,
}

pub(crate) fn parse(code: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| FragmentError::Syntax(e.to_string()))?;
    parser
        .parse(code, None)
        .ok_or_else(|| FragmentError::Syntax("parser returned no tree".to_string()))
}

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Children of `node` paired with their field names.
pub(crate) fn fields<'t>(node: Node<'t>) -> Vec<(Option<&'static str>, Node<'t>)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            out.push((cursor.field_name(), cursor.node()));
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    out
}

/// Find the free variables of `code`. Fails with `Syntax` if the code does
/// not parse cleanly.
pub fn free_variables(code: &str) -> Result<FreeVariables> {
    let tree = parse(code)?;
    let root = tree.root_node();
    if root.has_error() {
        let at = first_error(root)
            .map(|n| format!("line {}", n.start_position().row + 1))
            .unwrap_or_else(|| "unknown position".to_string());
        return Err(FragmentError::Syntax(format!("selection does not parse ({at})")));
    }

    let mut idents = Vec::new();
    visit(root, code.as_bytes(), Role::Load, &mut idents);

    let bound: HashSet<&str> = idents
        .iter()
        .filter(|i| i.role == Role::Store)
        .map(|i| i.name.as_str())
        .collect();

    let mut result = FreeVariables::default();
    for ident in idents.iter().filter(|i| i.role == Role::Load) {
        if bound.contains(ident.name.as_str()) || BUILTINS.contains(&ident.name.as_str()) {
            continue;
        }
        if !result.names.contains(&ident.name) {
            result.names.push(ident.name.clone());
        }
        result.occurrences.push(Occurrence {
            name: ident.name.clone(),
            start: ident.start,
            end: ident.end,
        });
    }
    Ok(result)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    fields(node)
        .into_iter()
        .filter(|(_, child)| child.has_error())
        .find_map(|(_, child)| first_error(child))
}

struct Ident {
    name: String,
    start: usize,
    end: usize,
    role: Role,
}

fn visit(node: Node, src: &[u8], role: Role, out: &mut Vec<Ident>) {
    let kind = node.kind();
    if kind == "identifier" {
        let role = match role {
            Role::Params => Role::Store,
            other => other,
        };
        out.push(Ident {
            name: node_text(node, src).to_string(),
            start: node.start_byte(),
            end: node.end_byte(),
            role,
        });
        return;
    }

    match kind {
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            visit_import(node, src, out);
            return;
        }
        "global_statement" | "nonlocal_statement" => return,
        _ => {}
    }

    let mut after_as = false;
    for (field, child) in fields(node) {
        // Older grammars leave the `except E as name` target without a field.
        let bare_except_alias = kind == "except_clause" && after_as;
        after_as = child.kind() == "as";
        let child_role = match (kind, field) {
            _ if bare_except_alias => Role::Store,
            (_, Some("type")) => Role::Load,
            ("assignment" | "for_statement" | "for_in_clause", Some("left")) => Role::Store,
            // `x += ..` reads `x` before rebinding it.
            ("augmented_assignment", Some("left")) => Role::Load,
            ("named_expression", Some("name")) => Role::Store,
            ("function_definition" | "class_definition", Some("name")) => Role::Store,
            ("function_definition" | "lambda", Some("parameters")) => Role::Params,
            ("as_pattern" | "except_clause", Some("alias")) => Role::Store,
            ("keyword_argument", Some("name")) => Role::Skip,
            ("attribute", Some("attribute")) => Role::Skip,
            ("default_parameter" | "typed_default_parameter", Some("value")) => Role::Load,
            _ => inherit(role, kind),
        };
        visit(child, src, child_role, out);
    }
}

/// Role of a child without a field-specific rule.
fn inherit(role: Role, parent_kind: &str) -> Role {
    match role {
        // Unpacking targets keep binding; `a.b = ..` and `a[i] = ..` read `a`.
        Role::Store => match parent_kind {
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "list_splat_pattern" | "parenthesized_expression" | "as_pattern_target"
            | "expression_list" => Role::Store,
            _ => Role::Load,
        },
        Role::Params => Role::Params,
        Role::Skip => Role::Skip,
        Role::Load => Role::Load,
    }
}

fn visit_import(node: Node, src: &[u8], out: &mut Vec<Ident>) {
    for (field, child) in fields(node) {
        if field != Some("name") {
            continue;
        }
        let bound = match child.kind() {
            "aliased_import" => child.child_by_field_name("alias"),
            "dotted_name" => first_identifier(child),
            _ => None,
        };
        if let Some(ident) = bound {
            out.push(Ident {
                name: node_text(ident, src).to_string(),
                start: ident.start_byte(),
                end: ident.end_byte(),
                role: Role::Store,
            });
        }
    }
}

fn first_identifier(node: Node) -> Option<Node> {
    if node.kind() == "identifier" {
        return Some(node);
    }
    fields(node).into_iter().find_map(|(_, c)| first_identifier(c))
}

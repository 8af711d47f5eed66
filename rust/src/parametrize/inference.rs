//! Placeholder type inference.

use super::python::{fields, node_text, parse};
use crate::error::{FragmentError, Result};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tree_sitter::Node;

/// Assigns a type label to each placeholder name.
pub trait TypeInferrer {
    /// `context` is the document text preceding the selection. Returns one
    /// type per name, in order, or fails with `Execution`.
    fn infer(&self, context: &str, names: &[String]) -> Result<Vec<String>>;
}

/// Reads types off the last binding of each name in the context, nested
/// bodies included: literals, annotations, constructor calls, definitions
/// and imports.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticInferrer;

impl TypeInferrer for StaticInferrer {
    fn infer(&self, context: &str, names: &[String]) -> Result<Vec<String>> {
        let tree = parse(context).map_err(|e| FragmentError::Execution(e.to_string()))?;
        let mut known = HashMap::new();
        collect_bindings(tree.root_node(), context.as_bytes(), &mut known);

        names
            .iter()
            .map(|name| {
                known.get(name).cloned().ok_or_else(|| {
                    FragmentError::Execution(format!("cannot infer type of `{name}`"))
                })
            })
            .collect()
    }
}

fn collect_bindings(node: Node, src: &[u8], known: &mut HashMap<String, String>) {
    match node.kind() {
        "assignment" => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    let ty = node
                        .child_by_field_name("type")
                        .map(|t| node_text(t, src).to_string())
                        .or_else(|| {
                            node.child_by_field_name("right")
                                .and_then(|r| literal_type(r, src, known))
                        });
                    let name = node_text(left, src).to_string();
                    match ty {
                        Some(ty) => known.insert(name, ty),
                        None => known.remove(&name),
                    };
                }
            }
        }
        "typed_parameter" | "typed_default_parameter" => {
            let ty = node.child_by_field_name("type").map(|t| node_text(t, src));
            let name = node.child_by_field_name("name").or_else(|| {
                fields(node)
                    .into_iter()
                    .map(|(_, c)| c)
                    .find(|c| c.kind() == "identifier")
            });
            if let (Some(name), Some(ty)) = (name, ty) {
                known.insert(node_text(name, src).to_string(), ty.to_string());
            }
        }
        "function_definition" | "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                let ty = if node.kind() == "function_definition" {
                    "function"
                } else {
                    "type"
                };
                known.insert(node_text(name, src).to_string(), ty.to_string());
            }
        }
        "aliased_import" => {
            if let Some(alias) = node.child_by_field_name("alias") {
                known.insert(node_text(alias, src).to_string(), "module".to_string());
            }
            return;
        }
        "import_statement" => {
            for (field, child) in fields(node) {
                if field == Some("name") && child.kind() == "dotted_name" {
                    let text = node_text(child, src);
                    let root = text.split('.').next().unwrap_or(text).trim();
                    known.insert(root.to_string(), "module".to_string());
                }
            }
        }
        _ => {}
    }

    for (_, child) in fields(node) {
        collect_bindings(child, src, known);
    }
}

fn literal_type(node: Node, src: &[u8], known: &HashMap<String, String>) -> Option<String> {
    let ty = match node.kind() {
        "integer" | "float" => {
            let text = node_text(node, src);
            if text.ends_with(['j', 'J']) {
                "complex"
            } else if node.kind() == "integer" {
                "int"
            } else {
                "float"
            }
        }
        "string" | "concatenated_string" => {
            let prefix: String = node_text(node, src)
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            if prefix.contains(['b', 'B']) {
                "bytes"
            } else {
                "str"
            }
        }
        "true" | "false" => "bool",
        "none" => "NoneType",
        "list" | "list_comprehension" => "list",
        "dictionary" | "dictionary_comprehension" => "dict",
        "set" | "set_comprehension" => "set",
        "tuple" => "tuple",
        "generator_expression" => "generator",
        "lambda" => "function",
        "parenthesized_expression" | "unary_operator" => {
            let inner = fields(node)
                .into_iter()
                .map(|(_, c)| c)
                .find(|c| c.is_named() && c.kind() != "comment")?;
            return literal_type(inner, src, known);
        }
        "identifier" => return known.get(node_text(node, src)).cloned(),
        "call" => return call_type(node, src),
        _ => return None,
    };
    Some(ty.to_string())
}

/// `Foo(...)`, `mod.Foo(...)` and builtin constructors name their result type.
fn call_type(node: Node, src: &[u8]) -> Option<String> {
    const CONSTRUCTORS: &[&str] = &[
        "int", "float", "complex", "str", "bytes", "bool", "list", "dict", "set",
        "frozenset", "tuple", "bytearray", "range",
    ];
    let function = node.child_by_field_name("function")?;
    let callee = match function.kind() {
        "identifier" => node_text(function, src),
        "attribute" => node_text(function.child_by_field_name("attribute")?, src),
        _ => return None,
    };
    let capitalized = callee.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    if capitalized || CONSTRUCTORS.contains(&callee) {
        Some(callee.to_string())
    } else {
        None
    }
}

/// Runs the context in a Python interpreter and asks it for
/// `type(name).__name__` of every placeholder.
#[derive(Debug, Clone)]
pub struct InterpreterInferrer {
    pub interpreter: PathBuf,
    pub timeout: Duration,
}

impl InterpreterInferrer {
    pub fn new(interpreter: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    fn script(context: &str, names: &[String]) -> Result<String> {
        let names = serde_json::to_string(names)?;
        Ok(format!(
            "{context}\n\
             import json as __fragment_json\n\
             print(__fragment_json.dumps({{__n: type(globals()[__n]).__name__ \
             for __n in {names} if __n in globals()}}))\n"
        ))
    }

    fn run(&self, script: &str) -> Result<String> {
        let exec_err = |e: std::io::Error| {
            FragmentError::Execution(format!("{}: {e}", self.interpreter.display()))
        };
        let mut child = Command::new(&self.interpreter)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(exec_err)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(script.as_bytes()) {
                // The interpreter stopped reading; its exit status tells why.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(exec_err(e));
                }
                Ok(()) => {}
            }
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(exec_err)? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FragmentError::Execution(format!(
                    "timed out after {:?}",
                    self.timeout
                )));
            }
            thread::sleep(Duration::from_millis(10));
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            let last = stderr.lines().last().unwrap_or("no output").to_string();
            return Err(FragmentError::Execution(last));
        }
        Ok(stdout)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut out = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut out);
        }
        out
    })
}

impl TypeInferrer for InterpreterInferrer {
    fn infer(&self, context: &str, names: &[String]) -> Result<Vec<String>> {
        let stdout = self.run(&Self::script(context, names)?)?;
        let line = stdout
            .lines()
            .last()
            .ok_or_else(|| FragmentError::Execution("no output".to_string()))?;
        let types: HashMap<String, String> = serde_json::from_str(line)
            .map_err(|e| FragmentError::Execution(format!("unreadable probe output: {e}")))?;

        names
            .iter()
            .map(|name| {
                types.get(name).cloned().ok_or_else(|| {
                    FragmentError::Execution(format!("`{name}` is not defined before the selection"))
                })
            })
            .collect()
    }
}

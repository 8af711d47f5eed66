use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextValue {
    Tag,
    Fragment,
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Tag => write!(f, "tag"),
            ContextValue::Fragment => write!(f, "fragment"),
        }
    }
}

/// A display entry of the projected tag/fragment tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    pub context_value: ContextValue,
    /// Owning tag, set only on fragment occurrences below a tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Label of the rendered fragment, set on fragment nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl Node {
    pub fn for_tag(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            context_value: ContextValue::Tag,
            tag: None,
            fragment: None,
            children: Vec::new(),
        }
    }

    /// Occurrence of `fragment` below `tag`, labeled `"<fragment> [TAG:<tag>]"`.
    pub fn occurrence(fragment: &str, tag: &str) -> Self {
        Self {
            label: occurrence_label(fragment, tag),
            context_value: ContextValue::Fragment,
            tag: Some(tag.to_string()),
            fragment: Some(fragment.to_string()),
            children: Vec::new(),
        }
    }

    pub fn untagged(fragment: &str) -> Self {
        Self {
            label: fragment.to_string(),
            context_value: ContextValue::Fragment,
            tag: None,
            fragment: Some(fragment.to_string()),
            children: Vec::new(),
        }
    }

    pub fn has_tag(&self) -> bool {
        self.tag.is_some()
    }

    pub fn is_fragment(&self) -> bool {
        self.context_value == ContextValue::Fragment
    }

    pub fn add_child(&mut self, label: impl Into<String>) {
        self.children.push(label.into());
    }
}

pub fn occurrence_label(fragment: &str, tag: &str) -> String {
    format!("{fragment} [TAG:{tag}]")
}

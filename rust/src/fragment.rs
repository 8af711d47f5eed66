//! The fragment value object and its tag set.

use crate::error::{FragmentError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered, de-duplicated set of tags.
///
/// Insert order is the display order of the projected tree. Tags are stored
/// trimmed; empty and whitespace-only tags never enter the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the legacy comma-joined form (`"a,b,"`).
    ///
    /// Empty and whitespace-only segments are discarded, repeated tags are
    /// kept once.
    pub fn parse_legacy(tags: &str) -> Self {
        let mut set = Self::new();
        for segment in tags.split(',') {
            set.push_unchecked(segment);
        }
        set
    }

    /// Render the legacy comma-joined form, one trailing comma per tag.
    pub fn to_legacy_string(&self) -> String {
        self.0.iter().map(|t| format!("{t},")).collect()
    }

    /// Insert a tag. Returns `Ok(false)` when the tag was already present.
    ///
    /// A tag containing a comma cannot be represented in the legacy form and
    /// is rejected.
    pub fn insert(&mut self, tag: &str) -> Result<bool> {
        let trimmed = tag.trim();
        if trimmed.is_empty() || trimmed.contains(',') {
            return Err(FragmentError::InvalidTag(tag.to_string()));
        }
        Ok(self.push_unchecked(trimmed))
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        let before = self.0.len();
        self.0.retain(|t| t != tag);
        self.0.len() != before
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag.trim())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push_unchecked(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.0.iter().any(|t| t == tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.push_unchecked(tag);
        }
        set
    }
}

impl Serialize for TagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Older stores keep tags as a comma-joined string.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            List(Vec<String>),
            Legacy(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::List(list) => list.iter().map(String::as_str).collect(),
            Repr::Legacy(s) => TagSet::parse_legacy(&s),
        })
    }
}

/// A saved, labeled code snippet with its metadata.
///
/// `prefix`, `scope`, `body` and `description` are the fields exported as an
/// editor snippet; the rest only live in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fragment {
    pub label: String,
    pub prefix: String,
    pub scope: String,
    pub body: String,
    pub description: String,
    pub keywords: String,
    pub domain: String,
    pub placeholders: String,
    pub tags: TagSet,
}

impl Fragment {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_placeholders(mut self, placeholders: impl Into<String>) -> Self {
        self.placeholders = placeholders.into();
        self
    }

    pub fn with_tags<'a>(mut self, tags: impl IntoIterator<Item = &'a str>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn add_tag(&mut self, tag: &str) -> Result<bool> {
        self.tags.insert(tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// Hover text: label and keywords underlined with `~`, then the body.
    pub fn tooltip(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.label);
        text.push('\n');
        text.push_str(&"~".repeat(self.label.chars().count()));
        text.push('\n');
        text.push_str(&self.keywords);
        text.push('\n');
        text.push_str(&"~".repeat(self.keywords.chars().count()));
        text.push('\n');
        text.push_str(&self.body);
        text.push('\n');
        text
    }
}

/// Partial update of a fragment's text fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct FragmentEdit {
    pub prefix: Option<String>,
    pub scope: Option<String>,
    pub body: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub domain: Option<String>,
    pub placeholders: Option<String>,
}

impl FragmentEdit {
    pub fn is_empty(&self) -> bool {
        self.prefix.is_none()
            && self.scope.is_none()
            && self.body.is_none()
            && self.description.is_none()
            && self.keywords.is_none()
            && self.domain.is_none()
            && self.placeholders.is_none()
    }

    pub fn apply(self, fragment: &mut Fragment) {
        let fields = [
            (self.prefix, &mut fragment.prefix),
            (self.scope, &mut fragment.scope),
            (self.body, &mut fragment.body),
            (self.description, &mut fragment.description),
            (self.keywords, &mut fragment.keywords),
            (self.domain, &mut fragment.domain),
            (self.placeholders, &mut fragment.placeholders),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_tags_drop_empty_segments_and_duplicates() {
        let tags = TagSet::parse_legacy("a,, ,b,a,");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(tags.to_legacy_string(), "a,b,");
    }

    #[test]
    fn insert_is_deduplicated_and_ordered() {
        let mut tags = TagSet::new();
        assert!(tags.insert("web").unwrap());
        assert!(tags.insert("db").unwrap());
        assert!(!tags.insert("web").unwrap());
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["web", "db"]);
    }

    #[test]
    fn insert_rejects_commas_and_blank_tags() {
        let mut tags = TagSet::new();
        assert!(matches!(tags.insert("a,b"), Err(FragmentError::InvalidTag(_))));
        assert!(matches!(tags.insert("  "), Err(FragmentError::InvalidTag(_))));
        assert!(tags.is_empty());
    }

    #[test]
    fn remove_keeps_remaining_tags() {
        let mut fragment = Fragment::new("A").with_tags(["x", "y"]);
        assert!(fragment.remove_tag("x"));
        assert!(!fragment.remove_tag("x"));
        assert_eq!(fragment.tags.iter().collect::<Vec<_>>(), vec!["y"]);
    }

    #[test]
    fn tags_deserialize_from_list_or_legacy_string() {
        let from_list: Fragment = serde_json::from_str(r#"{"label":"A","tags":["x","y","x"]}"#).unwrap();
        let from_legacy: Fragment = serde_json::from_str(r#"{"label":"A","tags":"x,y,"}"#).unwrap();
        assert_eq!(from_list.tags, from_legacy.tags);
        assert_eq!(from_list.body, "");

        let json = serde_json::to_value(&from_list).unwrap();
        assert_eq!(json["tags"], serde_json::json!(["x", "y"]));
    }

    #[test]
    fn tooltip_underlines_label_and_keywords() {
        let mut fragment = Fragment::new("abc").with_body("print(x)");
        fragment.keywords = "io".into();
        assert_eq!(fragment.tooltip(), "abc\n~~~\nio\n~~\nprint(x)\n");
    }

    #[test]
    fn edit_only_touches_given_fields() {
        let mut fragment = Fragment::new("A").with_body("x");
        fragment.scope = "python".into();
        FragmentEdit {
            body: Some("y".into()),
            description: Some("d".into()),
            ..FragmentEdit::default()
        }
        .apply(&mut fragment);
        assert_eq!(fragment.body, "y");
        assert_eq!(fragment.description, "d");
        assert_eq!(fragment.scope, "python");
    }
}

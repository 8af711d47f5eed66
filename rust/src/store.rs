//! Fragment storage and the derived node index.
//!
//! The store is a key/value collaborator: fragments are keyed by label, nodes
//! by node label. [`MemoryStore`] keeps both in memory, [`JsonFileStore`]
//! additionally persists fragments to a JSON document after every mutation.

use crate::error::{FragmentError, Result};
use crate::fragment::Fragment;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub trait Store {
    /// All fragments in insertion order.
    fn get_fragments(&self) -> Vec<Fragment>;

    fn get_fragment(&self, label: &str) -> Option<Fragment>;

    /// Fails with `DuplicateLabel` if the label is taken.
    fn add_fragment(&mut self, fragment: Fragment) -> Result<()>;

    /// Replace the fragment with the same label. Fails with `NotFound`.
    fn update_fragment(&mut self, fragment: Fragment) -> Result<()>;

    fn delete_fragment(&mut self, label: &str) -> Result<()>;

    fn get_node(&self, label: &str) -> Option<Node>;

    /// With `None`, every node of the index; fails with `MissingNodeList` if
    /// no index was built yet. With labels, the matching nodes in the given
    /// order; fails with `MissingChildList` naming the first unknown label.
    fn get_nodes(&self, labels: Option<&[String]>) -> Result<Vec<Node>>;

    /// Add a node; a node with the same label is replaced in place.
    fn add_node(&mut self, node: Node);

    /// Drop every node, leaving an empty (but built) index.
    fn clear_nodes(&mut self);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    fragments: Vec<Fragment>,
    nodes: Option<Vec<Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragments(fragments: Vec<Fragment>) -> Result<Self> {
        let mut store = Self::new();
        for fragment in fragments {
            store.add_fragment(fragment)?;
        }
        Ok(store)
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.fragments.iter().position(|f| f.label == label)
    }
}

impl Store for MemoryStore {
    fn get_fragments(&self) -> Vec<Fragment> {
        self.fragments.clone()
    }

    fn get_fragment(&self, label: &str) -> Option<Fragment> {
        self.position(label).map(|i| self.fragments[i].clone())
    }

    fn add_fragment(&mut self, fragment: Fragment) -> Result<()> {
        if self.position(&fragment.label).is_some() {
            return Err(FragmentError::DuplicateLabel(fragment.label));
        }
        self.fragments.push(fragment);
        Ok(())
    }

    fn update_fragment(&mut self, fragment: Fragment) -> Result<()> {
        let i = self
            .position(&fragment.label)
            .ok_or_else(|| FragmentError::NotFound(fragment.label.clone()))?;
        self.fragments[i] = fragment;
        Ok(())
    }

    fn delete_fragment(&mut self, label: &str) -> Result<()> {
        let i = self
            .position(label)
            .ok_or_else(|| FragmentError::NotFound(label.to_string()))?;
        self.fragments.remove(i);
        Ok(())
    }

    fn get_node(&self, label: &str) -> Option<Node> {
        self.nodes
            .as_ref()?
            .iter()
            .find(|n| n.label == label)
            .cloned()
    }

    fn get_nodes(&self, labels: Option<&[String]>) -> Result<Vec<Node>> {
        let nodes = self.nodes.as_ref().ok_or(FragmentError::MissingNodeList)?;
        match labels {
            None => Ok(nodes.clone()),
            Some(labels) => labels
                .iter()
                .map(|label| {
                    nodes
                        .iter()
                        .find(|n| &n.label == label)
                        .cloned()
                        .ok_or_else(|| FragmentError::MissingChildList(label.clone()))
                })
                .collect(),
        }
    }

    fn add_node(&mut self, node: Node) {
        let nodes = self.nodes.get_or_insert_with(Vec::new);
        match nodes.iter_mut().find(|n| n.label == node.label) {
            Some(existing) => *existing = node,
            None => nodes.push(node),
        }
    }

    fn clear_nodes(&mut self) {
        self.nodes = Some(Vec::new());
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    fragments: Vec<Fragment>,
}

/// Fragments persisted as a JSON document; the node index stays in memory.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store and is
    /// created on the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let file: StoreFile = if content.trim().is_empty() {
                StoreFile::default()
            } else {
                serde_json::from_str(&content)?
            };
            MemoryStore::with_fragments(file.fragments).map_err(|e| {
                FragmentError::Store(format!("{}: {e}", path.display()))
            })?
        } else {
            MemoryStore::new()
        };
        tracing::debug!(
            path = %path.display(),
            fragments = inner.fragments.len(),
            "Opened fragment store"
        );
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the fragments and keep it only once it is
    /// on disk.
    fn commit(&mut self, change: impl FnOnce(&mut MemoryStore) -> Result<()>) -> Result<()> {
        let mut staged = MemoryStore {
            fragments: self.inner.fragments.clone(),
            nodes: None,
        };
        change(&mut staged)?;
        self.save(&staged.fragments)?;
        self.inner.fragments = staged.fragments;
        Ok(())
    }

    fn save(&self, fragments: &[Fragment]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = StoreFile {
            fragments: fragments.to_vec(),
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get_fragments(&self) -> Vec<Fragment> {
        self.inner.get_fragments()
    }

    fn get_fragment(&self, label: &str) -> Option<Fragment> {
        self.inner.get_fragment(label)
    }

    fn add_fragment(&mut self, fragment: Fragment) -> Result<()> {
        self.commit(|staged| staged.add_fragment(fragment))
    }

    fn update_fragment(&mut self, fragment: Fragment) -> Result<()> {
        self.commit(|staged| staged.update_fragment(fragment))
    }

    fn delete_fragment(&mut self, label: &str) -> Result<()> {
        self.commit(|staged| staged.delete_fragment(label))
    }

    fn get_node(&self, label: &str) -> Option<Node> {
        self.inner.get_node(label)
    }

    fn get_nodes(&self, labels: Option<&[String]>) -> Result<Vec<Node>> {
        self.inner.get_nodes(labels)
    }

    fn add_node(&mut self, node: Node) {
        self.inner.add_node(node)
    }

    fn clear_nodes(&mut self) {
        self.inner.clear_nodes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_label_is_rejected() {
        let mut store = MemoryStore::new();
        store.add_fragment(Fragment::new("A")).unwrap();
        let err = store.add_fragment(Fragment::new("A")).unwrap_err();
        assert!(matches!(err, FragmentError::DuplicateLabel(l) if l == "A"));
    }

    #[test]
    fn update_and_delete_unknown_label() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.update_fragment(Fragment::new("nope")),
            Err(FragmentError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_fragment("nope"),
            Err(FragmentError::NotFound(_))
        ));
    }

    #[test]
    fn node_index_missing_until_built() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.get_nodes(None),
            Err(FragmentError::MissingNodeList)
        ));
        store.clear_nodes();
        assert!(store.get_nodes(None).unwrap().is_empty());

        store.add_node(Node::for_tag("x"));
        let err = store
            .get_nodes(Some(&["x".to_string(), "gone".to_string()]))
            .unwrap_err();
        assert!(matches!(err, FragmentError::MissingChildList(l) if l == "gone"));
    }

    #[test]
    fn add_node_replaces_same_label_in_place() {
        let mut store = MemoryStore::new();
        store.add_node(Node::for_tag("x"));
        store.add_node(Node::untagged("B"));
        let mut x = Node::for_tag("x");
        x.add_child("A [TAG:x]");
        store.add_node(x);

        let nodes = store.get_nodes(None).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].children, vec!["A [TAG:x]"]);
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fragments.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store
            .add_fragment(Fragment::new("A").with_body("x = 1").with_tags(["py"]))
            .unwrap();
        store.add_fragment(Fragment::new("B")).unwrap();
        store.delete_fragment("B").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let fragments = reopened.get_fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].body, "x = 1");
        assert!(fragments[0].tags.contains("py"));
    }

    #[test]
    fn json_store_reads_legacy_tag_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fragments.json");
        fs::write(
            &path,
            r#"{"fragments":[{"label":"A","tags":"x,y,"},{"label":"B"}]}"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let a = store.get_fragment("A").unwrap();
        assert_eq!(a.tags.iter().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(store.get_fragment("B").unwrap().tags.is_empty());
    }

    #[test]
    fn failed_save_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut store = JsonFileStore::open(blocker.join("fragments.json")).unwrap();
        assert!(matches!(
            store.add_fragment(Fragment::new("A")),
            Err(FragmentError::Io(_))
        ));
        assert!(store.get_fragment("A").is_none());
        // A retry fails the same way instead of reporting a duplicate.
        assert!(matches!(
            store.add_fragment(Fragment::new("A")),
            Err(FragmentError::Io(_))
        ));
    }

    #[test]
    fn failed_update_and_delete_keep_previous_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let path = nested.join("fragments.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store
            .add_fragment(Fragment::new("A").with_body("old"))
            .unwrap();

        fs::remove_dir_all(&nested).unwrap();
        fs::write(&nested, "").unwrap();

        assert!(store
            .update_fragment(Fragment::new("A").with_body("new"))
            .is_err());
        assert_eq!(store.get_fragment("A").unwrap().body, "old");
        assert!(store.delete_fragment("A").is_err());
        assert!(store.get_fragment("A").is_some());
    }
}

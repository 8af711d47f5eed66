//! Fragment session: the operations behind the editor commands.
//!
//! Every mutation goes through the injected [`Store`] and ends with a
//! [`refresh`](FragmentProvider::refresh) so the node index always reflects
//! the fragment collection.

use crate::error::{FragmentError, Result};
use crate::fragment::{Fragment, FragmentEdit};
use crate::node::Node;
use crate::parametrize::{Cascade, SelectionInput, Tier, TypeInferrer};
use crate::snippet::{self, Snippet};
use crate::status::Status;
use crate::store::Store;
use crate::tree::project;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The label prompt was declined.
    Aborted { statuses: Vec<Status> },
    Added {
        label: String,
        /// `None` for an empty fragment created without a selection.
        tier: Option<Tier>,
        statuses: Vec<Status>,
    },
}

impl AddOutcome {
    pub fn statuses(&self) -> &[Status] {
        match self {
            AddOutcome::Aborted { statuses } | AddOutcome::Added { statuses, .. } => statuses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(String),
    Untagged { fragment: String, tag: String },
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub skipped: Vec<String>,
}

/// Status shown when an add is rejected.
pub fn rejection_status(err: &FragmentError) -> Status {
    match err {
        FragmentError::EmptyLabel => Status::error("Fragment Not Added (no empty label allowed)"),
        FragmentError::DuplicateLabel(_) => {
            Status::error("Fragment Not Added (label has to be unique)")
        }
        other => Status::error(format!("Fragment Not Added ({other})")),
    }
}

pub struct FragmentProvider<S: Store> {
    store: S,
    inferrer: Option<Box<dyn TypeInferrer>>,
}

impl<S: Store> FragmentProvider<S> {
    /// Wrap `store` and build the initial tree. Parametrization runs without
    /// the datatype tier until an inferrer is set.
    pub fn new(store: S) -> Self {
        let mut provider = Self {
            store,
            inferrer: None,
        };
        provider.refresh();
        provider
    }

    pub fn with_inferrer(mut self, inferrer: Option<Box<dyn TypeInferrer>>) -> Self {
        self.inferrer = inferrer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Rebuild the node index from the current fragments.
    pub fn refresh(&mut self) {
        let tree = project(&self.store.get_fragments());
        self.store.clear_nodes();
        for node in tree.into_nodes() {
            self.store.add_node(node);
        }
    }

    /// Children of `parent`, or the root listing (tags and untagged
    /// fragments) without one. Index inconsistencies are logged and yield an
    /// empty list.
    pub fn children(&self, parent: Option<&Node>) -> Vec<Node> {
        let nodes = match parent {
            Some(node) => self.store.get_nodes(Some(&node.children)),
            None => self
                .store
                .get_nodes(None)
                .map(|nodes| nodes.into_iter().filter(|n| !n.has_tag()).collect()),
        };
        nodes.unwrap_or_else(|e| {
            let parent = parent.map(|n| n.label.as_str()).unwrap_or("<root>");
            tracing::warn!(parent, error = %e, "Cannot list children");
            Vec::new()
        })
    }

    pub fn get_node(&self, label: &str) -> Option<Node> {
        self.store.get_node(label)
    }

    /// A label is taken by any fragment and by any node of the tree.
    pub fn is_label_taken(&self, label: &str) -> bool {
        self.store.get_fragment(label).is_some() || self.store.get_node(label).is_some()
    }

    /// Create a fragment from an already prompted label and an optional
    /// selection.
    ///
    /// A declined prompt (`None`) aborts without error. Empty and non-unique
    /// labels are rejected; the caller may prompt again. With a selection the
    /// body comes from the parametrization cascade.
    pub fn add_fragment(
        &mut self,
        label: Option<&str>,
        input: Option<&SelectionInput>,
    ) -> Result<AddOutcome> {
        let Some(label) = label else {
            tracing::debug!("Add aborted, no label given");
            return Ok(AddOutcome::Aborted {
                statuses: vec![Status::error("Fragment Not Added")],
            });
        };
        if label.trim().is_empty() {
            return Err(FragmentError::EmptyLabel);
        }
        if self.is_label_taken(label) {
            return Err(FragmentError::DuplicateLabel(label.to_string()));
        }

        let (fragment, tier, statuses) = match input {
            None => (Fragment::new(label), None, Vec::new()),
            Some(input) => {
                let cascade = Cascade::for_input(input, self.inferrer.as_deref());
                let outcome = cascade.run(input)?;
                let fragment = Fragment::new(label)
                    .with_body(outcome.draft.body)
                    .with_placeholders(outcome.draft.placeholders);
                (fragment, Some(outcome.tier), outcome.statuses)
            }
        };

        self.store.add_fragment(fragment)?;
        self.refresh();
        tracing::info!(label, ?tier, "Fragment added");
        Ok(AddOutcome::Added {
            label: label.to_string(),
            tier,
            statuses,
        })
    }

    /// Fragment rendered by a fragment node.
    pub fn fragment_for(&self, node: &Node) -> Option<Fragment> {
        if !node.is_fragment() {
            return None;
        }
        self.store.get_fragment(node.fragment.as_deref()?)
    }

    pub fn get_fragment(&self, label: &str) -> Option<Fragment> {
        self.store.get_fragment(label)
    }

    pub fn edit_fragment(&mut self, label: &str, edit: FragmentEdit) -> Result<Fragment> {
        let mut fragment = self.require(label)?;
        edit.apply(&mut fragment);
        self.store.update_fragment(fragment.clone())?;
        self.refresh();
        Ok(fragment)
    }

    /// A tag may not reuse the label of a fragment or of a fragment node;
    /// sharing an existing tag node is fine.
    pub fn is_tag_taken(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.store.get_fragment(tag).is_some()
            || self.store.get_node(tag).is_some_and(|n| n.is_fragment())
    }

    /// Returns `false` if the fragment already carried the tag. A tag that
    /// would clash with a fragment label is rejected with `DuplicateLabel`.
    pub fn add_tag(&mut self, label: &str, tag: &str) -> Result<bool> {
        let mut fragment = self.require(label)?;
        let added = fragment.add_tag(tag)?;
        if added && self.is_tag_taken(tag) {
            return Err(FragmentError::DuplicateLabel(tag.trim().to_string()));
        }
        if added {
            self.store.update_fragment(fragment)?;
            self.refresh();
        }
        Ok(added)
    }

    /// Remove a tag without deleting the fragment.
    pub fn remove_tag(&mut self, label: &str, tag: &str) -> Result<bool> {
        let mut fragment = self.require(label)?;
        let removed = fragment.remove_tag(tag);
        if removed {
            self.store.update_fragment(fragment)?;
            self.refresh();
        }
        Ok(removed)
    }

    /// Delete what a fragment node shows.
    ///
    /// An untagged fragment is deleted. A tagged occurrence loses its tag;
    /// when no tag remains the fragment is deleted as well. Tag nodes and
    /// stale nodes are ignored.
    pub fn delete_tree_item(&mut self, node: &Node) -> Result<DeleteOutcome> {
        let Some(mut fragment) = self.fragment_for(node) else {
            tracing::warn!(node = %node.label, "Cannot delete tree item");
            return Ok(DeleteOutcome::Ignored);
        };

        let outcome = match &node.tag {
            Some(tag) if !fragment.tags.is_empty() => {
                fragment.remove_tag(tag);
                if fragment.tags.is_empty() {
                    self.store.delete_fragment(&fragment.label)?;
                    DeleteOutcome::Deleted(fragment.label)
                } else {
                    let label = fragment.label.clone();
                    self.store.update_fragment(fragment)?;
                    DeleteOutcome::Untagged {
                        fragment: label,
                        tag: tag.clone(),
                    }
                }
            }
            _ => {
                self.store.delete_fragment(&fragment.label)?;
                DeleteOutcome::Deleted(fragment.label)
            }
        };
        self.refresh();
        Ok(outcome)
    }

    pub fn delete_fragment(&mut self, label: &str) -> Result<()> {
        self.store.delete_fragment(label)?;
        self.refresh();
        Ok(())
    }

    /// Add imported fragments, skipping those whose label is taken or whose
    /// tags clash with a fragment label. The tree is rebuilt after every add
    /// so later fragments are checked against earlier ones.
    pub fn import(&mut self, fragments: Vec<Fragment>) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for fragment in fragments {
            let clashes = fragment.label.trim().is_empty()
                || self.is_label_taken(&fragment.label)
                || fragment.tags.iter().any(|t| self.is_tag_taken(t));
            if clashes {
                report.skipped.push(fragment.label);
                continue;
            }
            let label = fragment.label.clone();
            self.store.add_fragment(fragment)?;
            self.refresh();
            report.added.push(label);
        }
        Ok(report)
    }

    pub fn export(&self) -> BTreeMap<String, Snippet> {
        snippet::export(&self.store.get_fragments())
    }

    fn require(&self, label: &str) -> Result<Fragment> {
        self.store
            .get_fragment(label)
            .ok_or_else(|| FragmentError::NotFound(label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn provider(fragments: Vec<Fragment>) -> FragmentProvider<MemoryStore> {
        FragmentProvider::new(MemoryStore::with_fragments(fragments).unwrap())
    }

    fn labels(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.label.as_str()).collect()
    }

    #[test]
    fn root_listing_hides_occurrences() {
        let p = provider(vec![
            Fragment::new("A").with_tags(["x", "y"]),
            Fragment::new("B"),
        ]);
        let root = p.children(None);
        assert_eq!(labels(&root), vec!["x", "y", "B"]);
        assert_eq!(labels(&p.children(Some(&root[0]))), vec!["A [TAG:x]"]);
        assert!(p.children(Some(&root[2])).is_empty());
    }

    #[test]
    fn stale_child_list_is_logged_and_empty() {
        let p = provider(vec![Fragment::new("A").with_tags(["x"])]);
        let mut stale = p.get_node("x").unwrap();
        stale.children.push("gone [TAG:x]".to_string());
        assert!(p.children(Some(&stale)).is_empty());
    }

    #[test]
    fn add_rejects_empty_and_taken_labels() {
        let mut p = provider(vec![Fragment::new("A").with_tags(["x"])]);
        assert!(matches!(
            p.add_fragment(Some(""), None),
            Err(FragmentError::EmptyLabel)
        ));
        for taken in ["A", "x", "A [TAG:x]"] {
            let err = p.add_fragment(Some(taken), None).unwrap_err();
            assert!(matches!(err, FragmentError::DuplicateLabel(_)));
            assert_eq!(
                rejection_status(&err).message,
                "Fragment Not Added (label has to be unique)"
            );
        }
    }

    #[test]
    fn declined_prompt_aborts() {
        let mut p = provider(Vec::new());
        let outcome = p.add_fragment(None, None).unwrap();
        assert!(matches!(outcome, AddOutcome::Aborted { .. }));
        assert!(p.store().get_fragments().is_empty());
    }

    #[test]
    fn add_without_selection_creates_empty_fragment() {
        let mut p = provider(Vec::new());
        let outcome = p.add_fragment(Some("blank"), None).unwrap();
        assert_eq!(
            outcome,
            AddOutcome::Added {
                label: "blank".to_string(),
                tier: None,
                statuses: Vec::new()
            }
        );
        assert_eq!(labels(&p.children(None)), vec!["blank"]);
    }

    #[test]
    fn deleting_the_only_tag_deletes_the_fragment() {
        let mut p = provider(vec![Fragment::new("A").with_tags(["x"])]);
        let node = p.get_node("A [TAG:x]").unwrap();
        assert_eq!(
            p.delete_tree_item(&node).unwrap(),
            DeleteOutcome::Deleted("A".to_string())
        );
        assert!(p.get_fragment("A").is_none());
        assert!(p.children(None).is_empty());
    }

    #[test]
    fn deleting_one_of_several_tags_keeps_the_fragment() {
        let mut p = provider(vec![Fragment::new("A").with_tags(["x", "y"])]);
        let node = p.get_node("A [TAG:x]").unwrap();
        assert_eq!(
            p.delete_tree_item(&node).unwrap(),
            DeleteOutcome::Untagged {
                fragment: "A".to_string(),
                tag: "x".to_string()
            }
        );
        let fragment = p.get_fragment("A").unwrap();
        assert_eq!(fragment.tags.iter().collect::<Vec<_>>(), vec!["y"]);
        assert_eq!(labels(&p.children(None)), vec!["y"]);
    }

    #[test]
    fn deleting_untagged_fragment_and_ignoring_tag_nodes() {
        let mut p = provider(vec![Fragment::new("B"), Fragment::new("A").with_tags(["x"])]);
        let tag = p.get_node("x").unwrap();
        assert_eq!(p.delete_tree_item(&tag).unwrap(), DeleteOutcome::Ignored);

        let b = p.get_node("B").unwrap();
        assert_eq!(
            p.delete_tree_item(&b).unwrap(),
            DeleteOutcome::Deleted("B".to_string())
        );
        assert_eq!(labels(&p.children(None)), vec!["x"]);
    }

    #[test]
    fn tagging_moves_fragment_under_tag() {
        let mut p = provider(vec![Fragment::new("A")]);
        assert!(p.add_tag("A", "web").unwrap());
        assert!(!p.add_tag("A", "web").unwrap());
        assert!(matches!(
            p.add_tag("A", "a,b"),
            Err(FragmentError::InvalidTag(_))
        ));
        assert_eq!(labels(&p.children(None)), vec!["web"]);

        assert!(p.remove_tag("A", "web").unwrap());
        assert_eq!(labels(&p.children(None)), vec!["A"]);
        assert!(matches!(
            p.add_tag("missing", "web"),
            Err(FragmentError::NotFound(_))
        ));
    }

    #[test]
    fn edit_updates_fields_and_node_resolves_fragment() {
        let mut p = provider(vec![Fragment::new("A").with_tags(["x"])]);
        let edited = p
            .edit_fragment(
                "A",
                FragmentEdit {
                    prefix: Some("aa".into()),
                    ..FragmentEdit::default()
                },
            )
            .unwrap();
        assert_eq!(edited.prefix, "aa");

        let node = p.get_node("A [TAG:x]").unwrap();
        assert_eq!(p.fragment_for(&node).unwrap().prefix, "aa");
        assert!(p.fragment_for(&p.get_node("x").unwrap()).is_none());
    }

    #[test]
    fn import_skips_taken_labels() {
        let mut p = provider(vec![Fragment::new("A").with_tags(["x"])]);
        let report = p
            .import(vec![
                Fragment::new("A"),
                Fragment::new("x"),
                Fragment::new("C").with_body("c"),
            ])
            .unwrap();
        assert_eq!(report.added, vec!["C"]);
        assert_eq!(report.skipped, vec!["A", "x"]);
        assert_eq!(labels(&p.children(None)), vec!["x", "C"]);
        assert_eq!(p.export()["C"].body, vec!["c"]);
    }

    #[test]
    fn tag_cannot_reuse_a_fragment_label() {
        let mut p = provider(vec![Fragment::new("A"), Fragment::new("B").with_tags(["x"])]);
        for clash in ["B", " B ", "B [TAG:x]"] {
            let err = p.add_tag("A", clash).unwrap_err();
            assert!(matches!(err, FragmentError::DuplicateLabel(l) if l == clash.trim()));
        }
        assert!(p.get_fragment("A").unwrap().tags.is_empty());
        assert_eq!(labels(&p.children(None)), vec!["A", "x"]);

        // An existing tag node is shared.
        assert!(p.add_tag("A", "x").unwrap());
        let x = p.get_node("x").unwrap();
        assert_eq!(labels(&p.children(Some(&x))), vec!["A [TAG:x]", "B [TAG:x]"]);
    }

    #[test]
    fn import_checks_against_earlier_fragments_of_the_batch() {
        let mut p = provider(Vec::new());
        let report = p
            .import(vec![
                Fragment::new("C").with_tags(["z"]),
                Fragment::new("z"),
                Fragment::new("D"),
                Fragment::new("E").with_tags(["D"]),
            ])
            .unwrap();
        assert_eq!(report.added, vec!["C", "D"]);
        assert_eq!(report.skipped, vec!["z", "E"]);

        let z = p.get_node("z").unwrap();
        assert_eq!(z.context_value, crate::node::ContextValue::Tag);
        assert_eq!(labels(&p.children(Some(&z))), vec!["C [TAG:z]"]);
        assert_eq!(labels(&p.children(None)), vec!["z", "D"]);
    }
}

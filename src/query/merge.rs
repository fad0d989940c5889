use crate::query::{
    node::{Directive, Field, Fragment, Link, Node, Selection},
    QueryMergeError,
};
use indexmap::IndexMap;
use std::convert::Infallible;

enum Entry {
    Field(Field),
    Link(Link, Vec<Node>),
}

fn entry_of(selection: &Selection) -> Entry {
    match selection {
        Selection::Field(field) => Entry::Field(field.clone()),
        Selection::Link(link) => Entry::Link(
            Link {
                node: Node::default(),
                ..link.clone()
            },
            vec![link.node.clone()],
        ),
    }
}

fn union_directives(directives: &mut Vec<Directive>, others: &[Directive]) {
    for directive in others {
        if !directives.contains(directive) {
            directives.push(directive.clone());
        }
    }
}

/// Result-key indexed selections, in first-seen order.
///
/// Links under one key are accumulated and merged recursively by
/// [`Selections::finish`].
#[derive(Default)]
pub(crate) struct Selections {
    entries: IndexMap<String, Entry>,
}

impl Selections {
    /// Adds a selection, rejecting a key reused by a different selection.
    pub(crate) fn add(&mut self, selection: &Selection) -> Result<(), QueryMergeError> {
        let key = selection.result_key();
        match (self.entries.get_mut(key), selection) {
            (None, _) => self.insert(selection),
            (Some(Entry::Field(existing)), Selection::Field(field)) => {
                if existing.name != field.name || existing.options != field.options {
                    return Err(QueryMergeError::DistinctSelections(key.to_string()));
                }
                union_directives(&mut existing.directives, &field.directives);
            }
            (Some(Entry::Link(existing, nodes)), Selection::Link(link)) => {
                if existing.name != link.name || existing.options != link.options {
                    return Err(QueryMergeError::DistinctSelections(key.to_string()));
                }
                union_directives(&mut existing.directives, &link.directives);
                nodes.push(link.node.clone());
            }
            (Some(_), _) => return Err(QueryMergeError::FieldLinkCollision(key.to_string())),
        }
        Ok(())
    }

    /// Adds a requirement: equal keys always combine and a link absorbs a
    /// field of the same key, since fetching the link fetches the field.
    pub(crate) fn absorb(&mut self, selection: &Selection) {
        let key = selection.result_key();
        match (self.entries.get_mut(key), selection) {
            (None, _) => self.insert(selection),
            (Some(Entry::Field(existing)), Selection::Field(field)) => {
                union_directives(&mut existing.directives, &field.directives);
            }
            (Some(Entry::Link(existing, nodes)), Selection::Link(link)) => {
                union_directives(&mut existing.directives, &link.directives);
                nodes.push(link.node.clone());
            }
            (Some(existing @ Entry::Field(_)), Selection::Link(_)) => {
                *existing = entry_of(selection);
            }
            (Some(Entry::Link(..)), Selection::Field(_)) => {}
        }
    }

    fn insert(&mut self, selection: &Selection) {
        self.entries
            .insert(selection.result_key().to_string(), entry_of(selection));
    }

    /// Builds the final selections, merging accumulated link nodes with
    /// `merge_link`.
    pub(crate) fn finish<E, F>(self, mut merge_link: F) -> Result<Vec<Selection>, E>
    where
        F: FnMut(&Link, Vec<Node>) -> Result<Node, E>,
    {
        self.entries
            .into_iter()
            .map(|(_, entry)| match entry {
                Entry::Field(field) => Ok(Selection::Field(field)),
                Entry::Link(link, nodes) => {
                    let node = merge_link(&link, nodes)?;
                    Ok(Selection::Link(Link { node, ..link }))
                }
            })
            .collect()
    }
}

/// Type-conditional fragments grouped by type name, in first-seen order.
#[derive(Default)]
pub(crate) struct Fragments {
    groups: IndexMap<String, Vec<Node>>,
}

impl Fragments {
    pub(crate) fn push(&mut self, type_name: &str, node: Node) {
        self.groups
            .entry(type_name.to_string())
            .or_insert_with(Vec::new)
            .push(node);
    }

    /// Merges every group into one fragment; fragments left empty are dropped.
    pub(crate) fn finish<E, F>(self, mut merge_group: F) -> Result<Vec<Fragment>, E>
    where
        F: FnMut(&str, Vec<Node>) -> Result<Node, E>,
    {
        let mut fragments = Vec::with_capacity(self.groups.len());
        for (type_name, nodes) in self.groups {
            let node = merge_group(&type_name, nodes)?;
            if !node.is_empty() {
                fragments.push(Fragment {
                    type_name: Some(type_name),
                    node,
                });
            }
        }
        Ok(fragments)
    }
}

fn collect<E>(
    node: &Node,
    selections: &mut Selections,
    fragments: &mut Fragments,
    add: &mut impl FnMut(&mut Selections, &Selection) -> Result<(), E>,
) -> Result<(), E> {
    for selection in &node.selections {
        (*add)(selections, selection)?;
    }
    for fragment in &node.fragments {
        match &fragment.type_name {
            None => collect(&fragment.node, selections, fragments, &mut *add)?,
            Some(type_name) => fragments.push(type_name, fragment.node.clone()),
        }
    }
    Ok(())
}

fn merge_with<E>(
    nodes: &[Node],
    add: &mut impl FnMut(&mut Selections, &Selection) -> Result<(), E>,
) -> Result<Node, E> {
    let mut selections = Selections::default();
    let mut fragments = Fragments::default();
    for node in nodes {
        collect(node, &mut selections, &mut fragments, &mut *add)?;
    }
    let selections = selections.finish(|_, nodes| merge_with(&nodes, &mut *add))?;
    let fragments = fragments.finish(|_, nodes| merge_with(&nodes, &mut *add))?;
    Ok(Node {
        selections,
        fragments,
        ordered: nodes.iter().any(Node::is_ordered),
    })
}

/// Merges multiple query nodes into one, without schema knowledge.
///
/// Unconditional fragments are expanded in place; type-conditional ones are
/// merged per type name.
pub fn merge(nodes: &[Node]) -> Result<Node, QueryMergeError> {
    merge_with(nodes, &mut |selections: &mut Selections, selection: &Selection| {
        selections.add(selection)
    })
}

/// Merges requirement trees. Never fails: overlapping requirements combine.
pub fn merge_requirements(nodes: &[Node]) -> Node {
    let merged: Result<Node, Infallible> =
        merge_with(nodes, &mut |selections: &mut Selections, selection: &Selection| {
            selections.absorb(selection);
            Ok(())
        });
    match merged {
        Ok(node) => node,
        Err(never) => match never {},
    }
}

//! Schema-aware merging of query nodes with type-conditional fragments.

use crate::{
    graph::{Graph, ParentType},
    query::{
        merge::{Fragments, Selections},
        node::{Node, Selection},
        QueryMergeError,
    },
};
use log::trace;
use std::collections::HashSet;

/// What to do with a fragment on another interface met under an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlappingInterfaces {
    /// Keep the fragment as is.
    Keep,
    /// Hoist the fields both interfaces declare.
    Hoist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    hoist_interface_fields: bool,
    overlapping_interfaces: OverlappingInterfaces,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            hoist_interface_fields: true,
            overlapping_interfaces: OverlappingInterfaces::Keep,
        }
    }
}

enum Condition {
    Always,
    Hoist(HashSet<String>),
    Never,
}

/// Merges query nodes into one canonical node.
///
/// Fragments that always apply to the parent type are expanded in place.
/// Under an interface, fields of fragments on its implementors that the
/// interface declares are hoisted to the shared level; the rest stay in one
/// fragment per type name.
pub struct QueryMerger<'a> {
    graph: &'a Graph,
    options: MergeOptions,
}

impl<'a> QueryMerger<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            options: MergeOptions::default(),
        }
    }

    pub fn hoist_interface_fields(mut self, hoist: bool) -> Self {
        self.options.hoist_interface_fields = hoist;
        self
    }

    pub fn overlapping_interfaces(mut self, policy: OverlappingInterfaces) -> Self {
        self.options.overlapping_interfaces = policy;
        self
    }

    pub fn options(&self) -> MergeOptions {
        self.options
    }

    /// Merges a query made against the graph root.
    pub fn merge(&self, query: &Node) -> Result<Node, QueryMergeError> {
        self.merge_nodes(&[query.clone()], &ParentType::Root)
    }

    pub fn merge_nodes(
        &self,
        nodes: &[Node],
        parent: &ParentType,
    ) -> Result<Node, QueryMergeError> {
        let mut selections = Selections::default();
        let mut fragments = Fragments::default();
        for node in nodes {
            self.collect(node, parent, &mut selections, &mut fragments)?;
        }
        let selections = selections.finish(|link, nodes| {
            self.merge_nodes(&nodes, &self.graph.link_target(parent, link.name()))
        })?;
        let fragments = fragments.finish(|type_name, nodes| {
            self.merge_nodes(&nodes, &self.graph.parent_type(type_name))
        })?;
        Ok(Node {
            selections,
            fragments,
            ordered: nodes.iter().any(Node::is_ordered),
        })
    }

    fn collect(
        &self,
        node: &Node,
        parent: &ParentType,
        selections: &mut Selections,
        fragments: &mut Fragments,
    ) -> Result<(), QueryMergeError> {
        for selection in node.selections() {
            selections.add(selection)?;
        }
        for fragment in node.fragments() {
            let type_name = match fragment.type_name() {
                Some(type_name) => type_name,
                None => {
                    self.collect(fragment.node(), parent, selections, fragments)?;
                    continue;
                }
            };
            match self.condition(parent, type_name) {
                Condition::Always => {
                    trace!("expanding fragment on {} into {:?}", type_name, parent);
                    self.collect(fragment.node(), parent, selections, fragments)?;
                }
                Condition::Hoist(shared) => {
                    let (hoisted, specific): (Vec<&Selection>, Vec<&Selection>) = fragment
                        .node()
                        .selections()
                        .iter()
                        .partition(|selection| shared.contains(selection.name()));
                    trace!(
                        "hoisting {} field(s) of fragment on {} into {:?}",
                        hoisted.len(),
                        type_name,
                        parent
                    );
                    for selection in hoisted {
                        selections.add(selection)?;
                    }
                    fragments.push(
                        type_name,
                        Node {
                            selections: specific.into_iter().cloned().collect(),
                            fragments: fragment.node().fragments().to_vec(),
                            ordered: fragment.node().is_ordered(),
                        },
                    );
                }
                Condition::Never => fragments.push(type_name, fragment.node().clone()),
            }
        }
        Ok(())
    }

    fn condition(&self, parent: &ParentType, type_name: &str) -> Condition {
        match parent {
            ParentType::Root if self.graph.root().name() == type_name => Condition::Always,
            ParentType::Object(node) if self.graph.is_subtype(node, type_name) => {
                Condition::Always
            }
            ParentType::Interface(interface) | ParentType::Union(interface)
                if interface == type_name =>
            {
                Condition::Always
            }
            ParentType::Interface(interface) if self.options.hoist_interface_fields => {
                self.hoisted_fields(interface, type_name)
            }
            _ => Condition::Never,
        }
    }

    fn hoisted_fields(&self, interface: &str, type_name: &str) -> Condition {
        let shared = match self.graph.interface(interface) {
            Some(interface) => interface.fields(),
            None => return Condition::Never,
        };
        if self.graph.node(type_name).is_some() {
            if self.graph.is_subtype(type_name, interface) {
                return Condition::Hoist(shared.keys().cloned().collect());
            }
        } else if let Some(other) = self.graph.interface(type_name) {
            if self.options.overlapping_interfaces == OverlappingInterfaces::Hoist {
                return Condition::Hoist(
                    shared
                        .keys()
                        .filter(|name| other.fields().contains_key(name.as_str()))
                        .cloned()
                        .collect(),
                );
            }
        }
        Condition::Never
    }
}

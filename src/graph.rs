//! Graph schema: nodes, their fields and links, interfaces and unions.

use crate::{
    types::{Type, Types},
    value::Value,
};
use indexmap::IndexMap;

/// Declared option of a field.
///
/// An option without a default value is required.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphOption {
    name: String,
    typ: Type,
    default: Option<Value>,
}

impl GraphOption {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn typ(&self) -> &Type {
        &self.typ
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// A field or a link: links are fields whose type points to another node,
/// interface or union.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphField {
    name: String,
    typ: Type,
    options: Vec<GraphOption>,
}

impl GraphField {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
            options: vec![],
        }
    }

    pub fn with_options(mut self, options: Vec<GraphOption>) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn typ(&self) -> &Type {
        &self.typ
    }

    pub fn options(&self) -> &[GraphOption] {
        &self.options
    }

    pub fn is_link(&self) -> bool {
        self.typ.target().is_some()
    }
}

fn fields_map(fields: Vec<GraphField>) -> IndexMap<String, GraphField> {
    fields
        .into_iter()
        .map(|field| (field.name.clone(), field))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    name: String,
    fields: IndexMap<String, GraphField>,
    implements: Vec<String>,
}

impl GraphNode {
    pub fn new(name: impl Into<String>, fields: Vec<GraphField>) -> Self {
        Self {
            name: name.into(),
            fields: fields_map(fields),
            implements: vec![],
        }
    }

    pub fn implements<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implements = interfaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &IndexMap<String, GraphField> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&GraphField> {
        self.fields.get(name)
    }

    pub fn interfaces(&self) -> &[String] {
        &self.implements
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    name: String,
    fields: IndexMap<String, GraphField>,
}

impl Interface {
    pub fn new(name: impl Into<String>, fields: Vec<GraphField>) -> Self {
        Self {
            name: name.into(),
            fields: fields_map(fields),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &IndexMap<String, GraphField> {
        &self.fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    name: String,
    types: Vec<String>,
}

impl Union {
    pub fn new<I, S>(name: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }
}

/// The type a selection is made against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentType {
    Root,
    Object(String),
    Interface(String),
    Union(String),
    /// Resolution is deferred to the validator; nothing is hoisted or dropped.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    root: GraphNode,
    nodes: IndexMap<String, GraphNode>,
    interfaces: IndexMap<String, Interface>,
    unions: IndexMap<String, Union>,
}

impl Graph {
    pub fn new(nodes: Vec<GraphNode>, root: Vec<GraphField>) -> Self {
        Self {
            root: GraphNode::new("Root", root),
            nodes: nodes
                .into_iter()
                .map(|node| (node.name.clone(), node))
                .collect(),
            interfaces: IndexMap::new(),
            unions: IndexMap::new(),
        }
    }

    pub fn with_interfaces(mut self, interfaces: Vec<Interface>) -> Self {
        self.interfaces = interfaces
            .into_iter()
            .map(|interface| (interface.name.clone(), interface))
            .collect();
        self
    }

    pub fn with_unions(mut self, unions: Vec<Union>) -> Self {
        self.unions = unions
            .into_iter()
            .map(|union| (union.name.clone(), union))
            .collect();
        self
    }

    pub fn root(&self) -> &GraphNode {
        &self.root
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    pub fn union(&self, name: &str) -> Option<&Union> {
        self.unions.get(name)
    }

    /// Record types of every node and interface, keyed by name.
    ///
    /// A node's record includes the fields of the interfaces it implements.
    pub fn types(&self) -> Types {
        let mut types = Types::new();
        for interface in self.interfaces.values() {
            types.insert(interface.name(), record_of(interface.fields.values()));
        }
        for node in self.nodes.values() {
            let inherited = node
                .implements
                .iter()
                .filter_map(|name| self.interfaces.get(name))
                .flat_map(|interface| interface.fields.values());
            types.insert(node.name(), record_of(inherited.chain(node.fields.values())));
        }
        types
    }

    pub fn parent_type(&self, name: &str) -> ParentType {
        if self.nodes.contains_key(name) {
            ParentType::Object(name.to_string())
        } else if self.interfaces.contains_key(name) {
            ParentType::Interface(name.to_string())
        } else if self.unions.contains_key(name) {
            ParentType::Union(name.to_string())
        } else {
            ParentType::Unknown
        }
    }

    /// Finds a field visible on `parent`, including inherited interface fields.
    pub fn field(&self, parent: &ParentType, name: &str) -> Option<&GraphField> {
        match parent {
            ParentType::Root => self.root.field(name),
            ParentType::Object(node) => self.nodes.get(node).and_then(|node| {
                node.field(name).or_else(|| {
                    node.implements
                        .iter()
                        .filter_map(|interface| self.interfaces.get(interface))
                        .find_map(|interface| interface.fields.get(name))
                })
            }),
            ParentType::Interface(interface) => self
                .interfaces
                .get(interface)
                .and_then(|interface| interface.fields.get(name)),
            ParentType::Union(_) | ParentType::Unknown => None,
        }
    }

    /// The type selected by the link `name` of `parent`.
    pub fn link_target(&self, parent: &ParentType, name: &str) -> ParentType {
        match self.field(parent, name).and_then(|field| field.typ().target()) {
            Some(Type::TypeRef(target)) => self.parent_type(target),
            Some(Type::InterfaceRef(target)) => ParentType::Interface(target.clone()),
            Some(Type::UnionRef(target)) => ParentType::Union(target.clone()),
            _ => ParentType::Unknown,
        }
    }

    /// Whether every object of type `node` is also of type `type_name`:
    /// the same node, an interface it implements or a union it belongs to.
    pub fn is_subtype(&self, node: &str, type_name: &str) -> bool {
        node == type_name
            || self
                .nodes
                .get(node)
                .map_or(false, |n| n.implements.iter().any(|i| i == type_name))
            || self
                .unions
                .get(type_name)
                .map_or(false, |u| u.types.iter().any(|t| t == node))
    }
}

fn record_of<'a>(fields: impl Iterator<Item = &'a GraphField>) -> Type {
    Type::Record(
        fields
            .map(|field| (field.name.clone(), field.typ.clone()))
            .collect(),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Users listen to media (an interface) and ride transport (a union).
    pub(crate) fn media_graph() -> Graph {
        Graph::new(
            vec![
                GraphNode::new(
                    "User",
                    vec![
                        GraphField::new("id", Type::String),
                        GraphField::new("name", Type::String).with_options(vec![
                            GraphOption::new("capitalize", Type::optional(Type::Boolean))
                                .with_default(Value::Boolean(false)),
                        ]),
                        GraphField::new("info", Type::type_ref("Info")),
                        GraphField::new(
                            "playlist",
                            Type::sequence(Type::InterfaceRef("Media".to_string())),
                        ),
                    ],
                ),
                GraphNode::new(
                    "Info",
                    vec![
                        GraphField::new("email", Type::String),
                        GraphField::new("phone", Type::String),
                        GraphField::new(
                            "transport",
                            Type::optional(Type::UnionRef("Transport".to_string())),
                        ),
                    ],
                ),
                GraphNode::new("Audio", vec![GraphField::new("format", Type::String)])
                    .implements(vec!["Media"]),
                GraphNode::new("Video", vec![GraphField::new("codec", Type::String)])
                    .implements(vec!["Media"]),
                GraphNode::new(
                    "Car",
                    vec![
                        GraphField::new("model", Type::String),
                        GraphField::new("year", Type::String),
                    ],
                ),
                GraphNode::new("Bike", vec![GraphField::new("model", Type::String)]),
            ],
            vec![GraphField::new("user", Type::type_ref("User"))],
        )
        .with_interfaces(vec![Interface::new(
            "Media",
            vec![
                GraphField::new("id", Type::String),
                GraphField::new("duration", Type::Integer),
            ],
        )])
        .with_unions(vec![Union::new("Transport", vec!["Car", "Bike"])])
    }

    #[test]
    fn test_link_target() {
        let graph = media_graph();
        assert_eq!(
            graph.link_target(&ParentType::Root, "user"),
            ParentType::Object("User".to_string())
        );
        let user = ParentType::Object("User".to_string());
        assert_eq!(
            graph.link_target(&user, "playlist"),
            ParentType::Interface("Media".to_string())
        );
        assert_eq!(graph.link_target(&user, "id"), ParentType::Unknown);
        assert_eq!(
            graph.link_target(&ParentType::Object("Info".to_string()), "transport"),
            ParentType::Union("Transport".to_string())
        );
    }

    #[test]
    fn test_inherited_fields() {
        let graph = media_graph();
        let audio = ParentType::Object("Audio".to_string());
        assert_eq!(
            graph.field(&audio, "duration").map(GraphField::typ),
            Some(&Type::Integer)
        );
        assert_eq!(
            graph.types().get("Audio"),
            Some(&Type::record(vec![
                ("id", Type::String),
                ("duration", Type::Integer),
                ("format", Type::String),
            ]))
        );
    }

    #[test]
    fn test_is_subtype() {
        let graph = media_graph();
        assert!(graph.is_subtype("Audio", "Media"));
        assert!(graph.is_subtype("Car", "Transport"));
        assert!(!graph.is_subtype("Car", "Media"));
    }
}

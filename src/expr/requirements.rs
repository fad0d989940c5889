//! Derives the graph data a checked expression needs.

use super::{
    checker::{Checked, TypedExpr, TypedKind},
    refs::{RefId, References},
};
use crate::{
    query::{merge_requirements, Field, Link, Node, Selection},
    types::{Type, Types},
};

/// The query a requirement template asks for, if it asks for graph data.
///
/// Record fields become fields or links, sequences and optionals are looked
/// through; any other type asks for nothing.
pub fn type_to_query(typ: &Type) -> Option<Node> {
    match typ {
        Type::Record(fields) => Some(Node::new(fields.iter().map(|(name, typ)| {
            match type_to_query(typ) {
                Some(node) => Selection::from(Link::new(name.as_str(), node)),
                None => Selection::from(Field::new(name.as_str())),
            }
        }))),
        Type::Sequence(typ) | Type::Optional(typ) => type_to_query(typ),
        _ => None,
    }
}

fn unwrap_optional<'a>(types: &'a Types, typ: &'a Type) -> &'a Type {
    match types.resolve(typ) {
        Type::Optional(typ) => types.resolve(typ),
        typ => typ,
    }
}

/// Whether values of `typ` are objects with fields of their own.
fn is_object(types: &Types, typ: &Type) -> bool {
    matches!(
        unwrap_optional(types, typ),
        Type::Record(_) | Type::TypeRef(_) | Type::InterfaceRef(_) | Type::UnionRef(_)
    )
}

/// Converts a reference chain into a requirement, wrapping `add` into one
/// link per labelled object step.
fn ref_to_req(
    types: &Types,
    refs: &References,
    reference: RefId,
    add: Option<Node>,
) -> Option<Node> {
    let mut current = Some(reference);
    let mut req = add;
    while let Some(id) = current {
        let reference = &refs[id];
        let typ = unwrap_optional(types, reference.typ());
        let object = match typ {
            Type::Sequence(item) => is_object(types, item),
            typ => is_object(types, typ),
        };
        req = match (reference.label(), object) {
            (Some(label), true) => Some(Node::new(vec![Link::new(
                label,
                req.unwrap_or_default(),
            )])),
            (Some(label), false) => Some(Node::new(vec![Field::new(label)])),
            (None, true) => req,
            (None, false) => None,
        };
        current = reference.backref();
    }
    req
}

struct Extractor<'a> {
    types: &'a Types,
    refs: &'a References,
    reqs: Vec<Node>,
}

impl Extractor<'_> {
    fn add(&mut self, reference: RefId, add: Option<Node>) {
        if let Some(req) = ref_to_req(self.types, self.refs, reference, add) {
            self.reqs.push(req);
        }
    }

    fn visit(&mut self, expr: &TypedExpr) {
        if let Some(reference) = expr.reference() {
            self.add(reference, None);
        }
        match expr.kind() {
            TypedKind::Symbol(_) | TypedKind::Constant(_) => {}
            TypedKind::Get(obj, _) => self.visit(obj),
            TypedKind::Each(binder, collection, body) => {
                self.add(binder.reference(), None);
                self.visit(collection);
                self.visit(body);
            }
            TypedKind::If(test, then, otherwise) => {
                self.visit(test);
                self.visit(then);
                self.visit(otherwise);
            }
            TypedKind::IfSome(binder, bind, then, otherwise) => {
                self.add(binder.reference(), None);
                self.visit(bind);
                self.visit(then);
                self.visit(otherwise);
            }
            TypedKind::Call(_, params, args) => {
                for (arg, param) in args.iter().zip(params) {
                    match (arg.reference(), type_to_query(param)) {
                        (Some(reference), Some(query)) => self.add(reference, Some(query)),
                        _ => self.visit(arg),
                    }
                }
            }
            TypedKind::List(items) => items.iter().for_each(|item| self.visit(item)),
            TypedKind::Map(entries) => entries.iter().for_each(|(_, value)| self.visit(value)),
        }
    }
}

/// Extracts the merged requirements of a checked expression, rooted at the
/// names bound before checking.
pub fn extract(checked: &Checked, types: &Types) -> Node {
    let mut extractor = Extractor {
        types,
        refs: checked.refs(),
        reqs: vec![],
    };
    extractor.visit(checked.root());
    merge_requirements(&extractor.reqs)
}

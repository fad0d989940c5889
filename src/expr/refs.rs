//! Arena of references: paths from a bound root through `get`/`each` steps.

use crate::types::Type;
use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(usize);

impl RefId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One step of a reference chain.
///
/// A root has no backref and is labelled with its bound name. `get` steps are
/// labelled with the attribute name; `each` and `if_some` bindings are not
/// labelled, they stand for the items of their backref.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    backref: Option<RefId>,
    label: Option<String>,
    typ: Type,
}

impl Reference {
    pub fn backref(&self) -> Option<RefId> {
        self.backref
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn typ(&self) -> &Type {
        &self.typ
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    refs: Vec<Reference>,
}

impl References {
    fn push(&mut self, reference: Reference) -> RefId {
        self.refs.push(reference);
        RefId(self.refs.len() - 1)
    }

    pub fn root(&mut self, name: impl Into<String>, typ: Type) -> RefId {
        self.push(Reference {
            backref: None,
            label: Some(name.into()),
            typ,
        })
    }

    pub fn named(&mut self, backref: RefId, name: impl Into<String>, typ: Type) -> RefId {
        self.push(Reference {
            backref: Some(backref),
            label: Some(name.into()),
            typ,
        })
    }

    pub fn unnamed(&mut self, backref: RefId, typ: Type) -> RefId {
        self.push(Reference {
            backref: Some(backref),
            label: None,
            typ,
        })
    }

    pub fn get(&self, id: RefId) -> Option<&Reference> {
        self.refs.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Walks from `id` back to its root.
    pub fn chain(&self, id: RefId) -> impl Iterator<Item = &Reference> {
        std::iter::successors(self.get(id), move |reference| {
            reference.backref.and_then(|backref| self.get(backref))
        })
    }

    /// The bound name a reference chain starts from.
    pub fn root_name(&self, id: RefId) -> Option<&str> {
        self.chain(id).last().and_then(Reference::label)
    }
}

impl Index<RefId> for References {
    type Output = Reference;

    fn index(&self, id: RefId) -> &Reference {
        &self.refs[id.0]
    }
}

//! Types of the graph data.

use derive_more::Display;
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;

/// A schema type.
///
/// `TypeRef`, `InterfaceRef` and `UnionRef` name other types and are resolved
/// through [`Types`].
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Any,
    Boolean,
    String,
    Integer,
    Float,
    Optional(Box<Type>),
    Sequence(Box<Type>),
    Mapping(Box<Type>, Box<Type>),
    Record(IndexMap<String, Type>),
    TypeRef(String),
    InterfaceRef(String),
    UnionRef(String),
}

impl Type {
    pub fn optional(typ: Type) -> Self {
        Type::Optional(Box::new(typ))
    }

    pub fn sequence(typ: Type) -> Self {
        Type::Sequence(Box::new(typ))
    }

    pub fn mapping(key: Type, value: Type) -> Self {
        Type::Mapping(Box::new(key), Box::new(value))
    }

    pub fn record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Type::Record(
            fields
                .into_iter()
                .map(|(name, typ)| (name.into(), typ))
                .collect(),
        )
    }

    pub fn type_ref(name: impl Into<String>) -> Self {
        Type::TypeRef(name.into())
    }

    /// Returns the named type this type ultimately points to, looking through
    /// `Optional` and `Sequence` wrappers.
    pub fn target(&self) -> Option<&Type> {
        match self {
            Type::Optional(typ) | Type::Sequence(typ) => typ.target(),
            Type::TypeRef(_) | Type::InterfaceRef(_) | Type::UnionRef(_) => Some(self),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::Boolean => write!(f, "Boolean"),
            Type::String => write!(f, "String"),
            Type::Integer => write!(f, "Integer"),
            Type::Float => write!(f, "Float"),
            Type::Optional(typ) => write!(f, "Optional[{}]", typ),
            Type::Sequence(typ) => write!(f, "Sequence[{}]", typ),
            Type::Mapping(key, value) => write!(f, "Mapping[{}, {}]", key, value),
            Type::Record(fields) => write!(
                f,
                "Record[{{{}}}]",
                fields
                    .iter()
                    .map(|(name, typ)| format!("{:?}: {}", name, typ))
                    .join(", ")
            ),
            Type::TypeRef(name) => write!(f, "TypeRef[{:?}]", name),
            Type::InterfaceRef(name) => write!(f, "InterfaceRef[{:?}]", name),
            Type::UnionRef(name) => write!(f, "UnionRef[{:?}]", name),
        }
    }
}

/// Registry of named types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Types {
    types: IndexMap<String, Type>,
}

impl Types {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, typ: Type) {
        self.types.insert(name.into(), typ);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// Follows named references until a structural type is reached.
    ///
    /// Unknown names resolve to themselves.
    pub fn resolve<'a>(&'a self, typ: &'a Type) -> &'a Type {
        match typ {
            Type::TypeRef(name) | Type::InterfaceRef(name) | Type::UnionRef(name) => {
                match self.types.get(name.as_str()) {
                    Some(resolved) if resolved != typ => self.resolve(resolved),
                    _ => typ,
                }
            }
            _ => typ,
        }
    }

    /// Checks that a value of type `source` can be used where `target` is
    /// expected.
    ///
    /// Records are compatible when `source` has every field `target` requires,
    /// sequences and mappings match element-wise, and an `Optional` target
    /// is satisfied by a non-optional source.
    pub fn check_type(&self, source: &Type, target: &Type) -> Result<(), Mismatch> {
        let (source, target) = (self.resolve(source), self.resolve(target));
        match (source, target) {
            (_, Type::Any) => Ok(()),
            (Type::Optional(s), Type::Optional(t))
            | (Type::Sequence(s), Type::Sequence(t)) => self.check_type(s, t),
            (Type::Mapping(sk, sv), Type::Mapping(tk, tv)) => {
                self.check_type(sk, tk)?;
                self.check_type(sv, tv)
            }
            (Type::Record(s), Type::Record(t)) => {
                for (name, t_field) in t {
                    match s.get(name) {
                        Some(s_field) => self.check_type(s_field, t_field)?,
                        None => return Err(Mismatch::MissingField(name.clone())),
                    }
                }
                Ok(())
            }
            (_, Type::Optional(t)) => self.check_type(source, t),
            (Type::Boolean, Type::Boolean)
            | (Type::String, Type::String)
            | (Type::Integer, Type::Integer)
            | (Type::Float, Type::Float) => Ok(()),
            (Type::TypeRef(s), Type::TypeRef(t))
            | (Type::InterfaceRef(s), Type::InterfaceRef(t))
            | (Type::UnionRef(s), Type::UnionRef(t))
                if s == t =>
            {
                Ok(())
            }
            _ => Err(Mismatch::Types(source.clone(), target.clone())),
        }
    }
}

/// Why two types are incompatible.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum Mismatch {
    #[display(fmt = "Missing field \"{}\"", _0)]
    MissingField(String),
    #[display(fmt = "Types mismatch, {} != {}", _0, _1)]
    Types(Type, Type),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_types() -> Types {
        let mut types = Types::new();
        types.insert("Foo", Type::record(vec![("bar", Type::Integer)]));
        types
    }

    #[test]
    fn test_resolve() {
        let types = bar_types();
        assert_eq!(
            types.resolve(&Type::type_ref("Foo")),
            &Type::record(vec![("bar", Type::Integer)])
        );
        assert_eq!(
            types.resolve(&Type::type_ref("Missing")),
            &Type::type_ref("Missing")
        );
    }

    #[test]
    fn test_record_subset() {
        let types = bar_types();
        assert_eq!(
            types.check_type(&Type::type_ref("Foo"), &Type::record(vec![("bar", Type::Any)])),
            Ok(())
        );
        assert_eq!(
            types.check_type(
                &Type::type_ref("Foo"),
                &Type::record(vec![("baz", Type::Integer)])
            ),
            Err(Mismatch::MissingField("baz".to_string()))
        );
    }

    #[test]
    fn test_optional_target() {
        let types = bar_types();
        let target = Type::optional(Type::record(vec![("bar", Type::Integer)]));
        assert_eq!(types.check_type(&Type::type_ref("Foo"), &target), Ok(()));
        assert_eq!(
            types.check_type(&Type::optional(Type::type_ref("Foo")), &target),
            Ok(())
        );
        assert!(types
            .check_type(&Type::optional(Type::Integer), &Type::Integer)
            .is_err());
    }

    #[test]
    fn test_sequence() {
        let types = bar_types();
        assert_eq!(
            types.check_type(
                &Type::sequence(Type::type_ref("Foo")),
                &Type::sequence(Type::record(vec![("bar", Type::Integer)]))
            ),
            Ok(())
        );
        assert!(types
            .check_type(&Type::sequence(Type::String), &Type::sequence(Type::Integer))
            .is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Type::optional(Type::sequence(Type::type_ref("Foo"))).to_string(),
            "Optional[Sequence[TypeRef[\"Foo\"]]]"
        );
    }
}

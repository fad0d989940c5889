use super::{
    ast::{Atom, Expr},
    env::Environment,
    error::SchemaTypeError,
    refs::{RefId, References},
    requirements::type_to_query,
};
use crate::types::{Mismatch, Type, Types};
use indexmap::IndexMap;

/// A name introduced by `each` or `if_some`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binder {
    name: String,
    reference: RefId,
}

impl Binder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> RefId {
        self.reference
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedKind {
    Symbol(String),
    Constant(Atom),
    Get(Box<TypedExpr>, String),
    Each(Binder, Box<TypedExpr>, Box<TypedExpr>),
    If(Box<TypedExpr>, Box<TypedExpr>, Box<TypedExpr>),
    IfSome(Binder, Box<TypedExpr>, Box<TypedExpr>, Box<TypedExpr>),
    /// A function call with the parameter types it was checked against.
    Call(String, Vec<Type>, Vec<TypedExpr>),
    List(Vec<TypedExpr>),
    Map(Vec<(String, TypedExpr)>),
}

/// An expression node annotated with the reference of the value it denotes.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    kind: TypedKind,
    reference: Option<RefId>,
}

impl TypedExpr {
    fn new(kind: TypedKind) -> Self {
        Self {
            kind,
            reference: None,
        }
    }

    fn with_reference(kind: TypedKind, reference: RefId) -> Self {
        Self {
            kind,
            reference: Some(reference),
        }
    }

    pub fn kind(&self) -> &TypedKind {
        &self.kind
    }

    pub fn reference(&self) -> Option<RefId> {
        self.reference
    }
}

/// A type-checked expression together with the references it points into.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked {
    root: TypedExpr,
    refs: References,
}

impl Checked {
    pub fn root(&self) -> &TypedExpr {
        &self.root
    }

    pub fn refs(&self) -> &References {
        &self.refs
    }
}

/// Checks expressions against the graph types.
///
/// Roots (`this`, fields of the graph root, field options) are bound before
/// checking; `each` and `if_some` push a scope for their bound name.
pub struct Checker<'a> {
    types: &'a Types,
    functions: &'a Environment,
    refs: References,
    scopes: Vec<IndexMap<String, RefId>>,
}

impl<'a> Checker<'a> {
    pub fn new(types: &'a Types, functions: &'a Environment) -> Self {
        Self {
            types,
            functions,
            refs: References::default(),
            scopes: vec![IndexMap::new()],
        }
    }

    /// Binds a root name. Later bindings shadow earlier ones.
    pub fn bind(mut self, name: &str, typ: Type) -> Self {
        let reference = self.refs.root(name, typ);
        self.scopes[0].insert(name.to_string(), reference);
        self
    }

    pub fn check(mut self, expr: &Expr) -> Result<Checked, SchemaTypeError> {
        let root = self.visit(expr)?;
        Ok(Checked {
            root,
            refs: self.refs,
        })
    }

    fn lookup(&self, name: &str) -> Option<RefId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn scoped<T>(
        &mut self,
        name: &str,
        reference: RefId,
        f: impl FnOnce(&mut Self) -> Result<T, SchemaTypeError>,
    ) -> Result<T, SchemaTypeError> {
        self.scopes
            .push(vec![(name.to_string(), reference)].into_iter().collect());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn type_of(&self, reference: RefId) -> Type {
        self.types.resolve(self.refs[reference].typ()).clone()
    }

    fn referenced(&mut self, expr: &Expr) -> Result<(TypedExpr, RefId), SchemaTypeError> {
        let typed = self.visit(expr)?;
        match typed.reference {
            Some(reference) => Ok((typed, reference)),
            None => Err(SchemaTypeError::NoReference(expr.to_string())),
        }
    }

    fn visit(&mut self, expr: &Expr) -> Result<TypedExpr, SchemaTypeError> {
        match expr {
            Expr::Symbol(name) => match self.lookup(name) {
                Some(reference) => Ok(TypedExpr::with_reference(
                    TypedKind::Symbol(name.clone()),
                    reference,
                )),
                None => Err(SchemaTypeError::UnknownSymbol(name.clone())),
            },
            Expr::Constant(atom) => Ok(TypedExpr::new(TypedKind::Constant(atom.clone()))),
            Expr::List(items) => Ok(TypedExpr::new(TypedKind::List(
                items
                    .iter()
                    .map(|item| self.visit(item))
                    .collect::<Result<_, _>>()?,
            ))),
            Expr::Map(entries) => {
                let mut typed = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    match key {
                        Expr::Constant(Atom::Keyword(key)) => {
                            typed.push((key.clone(), self.visit(value)?))
                        }
                        _ => return Err(SchemaTypeError::InvalidMapKey(key.to_string())),
                    }
                }
                Ok(TypedExpr::new(TypedKind::Map(typed)))
            }
            Expr::Application(head, args) => match head.as_ref() {
                Expr::Symbol(name) => match name.as_str() {
                    "get" => self.visit_get(expr, args),
                    "each" => self.visit_each(expr, args),
                    "if" => self.visit_if(expr, args),
                    "if_some" => self.visit_if_some(expr, args),
                    _ => self.visit_call(name, args),
                },
                _ => Err(SchemaTypeError::InvalidHead(head.to_string())),
            },
        }
    }

    fn visit_get(&mut self, expr: &Expr, args: &[Expr]) -> Result<TypedExpr, SchemaTypeError> {
        let (obj, name) = match args {
            [obj, Expr::Symbol(name)]
            | [obj, Expr::Constant(Atom::Keyword(name))]
            | [obj, Expr::Constant(Atom::String(name))] => (obj, name),
            _ => return Err(malformed("get", expr)),
        };
        let (obj, obj_ref) = self.referenced(obj)?;
        let field_type = match self.type_of(obj_ref) {
            Type::Record(mut fields) => match fields.shift_remove(name) {
                Some(typ) => typ,
                None => return Err(SchemaTypeError::MissingField(name.clone())),
            },
            typ => return Err(SchemaTypeError::NotARecord(typ.to_string())),
        };
        let reference = self.refs.named(obj_ref, name.as_str(), field_type);
        Ok(TypedExpr::with_reference(
            TypedKind::Get(Box::new(obj), name.clone()),
            reference,
        ))
    }

    fn visit_each(&mut self, expr: &Expr, args: &[Expr]) -> Result<TypedExpr, SchemaTypeError> {
        let (var, collection, body) = match args {
            [Expr::Symbol(var), collection, body] => (var, collection, body),
            _ => return Err(malformed("each", expr)),
        };
        let (collection, collection_ref) = self.referenced(collection)?;
        let item_type = match self.type_of(collection_ref) {
            Type::Sequence(item) => *item,
            typ => return Err(SchemaTypeError::NotASequence(typ.to_string())),
        };
        let reference = self.refs.unnamed(collection_ref, item_type);
        let body = self.scoped(var, reference, |checker| checker.visit(body))?;
        Ok(TypedExpr::new(TypedKind::Each(
            Binder {
                name: var.clone(),
                reference,
            },
            Box::new(collection),
            Box::new(body),
        )))
    }

    fn visit_if(&mut self, expr: &Expr, args: &[Expr]) -> Result<TypedExpr, SchemaTypeError> {
        match args {
            [test, then, otherwise] => Ok(TypedExpr::new(TypedKind::If(
                Box::new(self.visit(test)?),
                Box::new(self.visit(then)?),
                Box::new(self.visit(otherwise)?),
            ))),
            _ => Err(malformed("if", expr)),
        }
    }

    fn visit_if_some(&mut self, expr: &Expr, args: &[Expr]) -> Result<TypedExpr, SchemaTypeError> {
        let (var, bind, then, otherwise) = match args {
            [Expr::List(binding), then, otherwise] => match binding.as_slice() {
                [Expr::Symbol(var), bind] => (var, bind, then, otherwise),
                _ => return Err(malformed("if_some", expr)),
            },
            _ => return Err(malformed("if_some", expr)),
        };
        let (bind, bind_ref) = self.referenced(bind)?;
        let reference = match self.type_of(bind_ref) {
            Type::Optional(typ) => self.refs.unnamed(bind_ref, *typ),
            _ => bind_ref,
        };
        let then = self.scoped(var, reference, |checker| checker.visit(then))?;
        let otherwise = self.visit(otherwise)?;
        Ok(TypedExpr::new(TypedKind::IfSome(
            Binder {
                name: var.clone(),
                reference,
            },
            Box::new(bind),
            Box::new(then),
            Box::new(otherwise),
        )))
    }

    fn visit_call(&mut self, name: &str, args: &[Expr]) -> Result<TypedExpr, SchemaTypeError> {
        let functions = self.functions;
        let params = match functions.get(name) {
            Some(function) => function.params(),
            None => return Err(SchemaTypeError::UnknownFunction(name.to_string())),
        };
        if params.len() != args.len() {
            return Err(SchemaTypeError::ArityMismatch(
                name.to_string(),
                params.len(),
                args.len(),
            ));
        }
        let mut typed = Vec::with_capacity(args.len());
        for (i, (arg, param)) in args.iter().zip(params).enumerate() {
            let arg_typed = self.visit(arg)?;
            let argument = |mismatch: Mismatch| {
                SchemaTypeError::ArgumentMismatch(name.to_string(), i, mismatch)
            };
            match (arg_typed.reference, &arg_typed.kind) {
                (Some(reference), _) => self
                    .types
                    .check_type(&self.type_of(reference), param)
                    .map_err(argument)?,
                (None, TypedKind::Constant(Atom::Nil)) => {
                    match self.types.resolve(param) {
                        Type::Any | Type::Optional(_) => {}
                        _ => {
                            return Err(argument(Mismatch::Types(
                                Type::optional(Type::Any),
                                param.clone(),
                            )))
                        }
                    }
                }
                (None, TypedKind::Constant(atom)) => self
                    .types
                    .check_type(&atom_type(atom), param)
                    .map_err(argument)?,
                (None, _) => {
                    if type_to_query(param).is_some() {
                        return Err(SchemaTypeError::NoReference(arg.to_string()));
                    }
                }
            }
            typed.push(arg_typed);
        }
        Ok(TypedExpr::new(TypedKind::Call(
            name.to_string(),
            params.to_vec(),
            typed,
        )))
    }
}

fn atom_type(atom: &Atom) -> Type {
    match atom {
        Atom::Nil => Type::optional(Type::Any),
        Atom::Boolean(_) => Type::Boolean,
        Atom::Integer(_) => Type::Integer,
        Atom::Float(_) => Type::Float,
        Atom::String(_) | Atom::Keyword(_) => Type::String,
    }
}

fn malformed(form: &str, expr: &Expr) -> SchemaTypeError {
    SchemaTypeError::MalformedForm(form.to_string(), expr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        expr::{parse, Function},
        value::Value,
    };

    fn shop_types() -> Types {
        let mut types = Types::new();
        types.insert(
            "Order",
            Type::record(vec![
                ("id", Type::Integer),
                ("items", Type::sequence(Type::type_ref("Item"))),
                ("coupon", Type::optional(Type::type_ref("Coupon"))),
                ("tags", Type::sequence(Type::String)),
            ]),
        );
        types.insert(
            "Item",
            Type::record(vec![("price", Type::Integer), ("name", Type::String)]),
        );
        types.insert("Coupon", Type::record(vec![("discount", Type::Integer)]));
        types
    }

    fn shop_functions() -> Environment {
        Environment::new()
            .with(
                "total",
                Function::new(
                    vec![Type::sequence(Type::record(vec![("price", Type::Integer)]))],
                    |_| Ok(Value::Null),
                ),
            )
            .with(
                "inc",
                Function::new(vec![Type::Integer], |_| Ok(Value::Null)),
            )
    }

    fn check(source: &str) -> Result<Checked, SchemaTypeError> {
        let types = shop_types();
        let functions = shop_functions();
        Checker::new(&types, &functions)
            .bind("this", Type::type_ref("Order"))
            .bind("limit", Type::Integer)
            .check(&parse(source).unwrap())
    }

    #[test]
    fn test_get() {
        let checked = check("(get this :id)").unwrap();
        let reference = checked.root().reference().unwrap();
        assert_eq!(checked.refs()[reference].label(), Some("id"));
        assert_eq!(checked.refs()[reference].typ(), &Type::Integer);
        assert_eq!(checked.refs().root_name(reference), Some("this"));
    }

    #[test]
    fn test_each_binds_item() {
        let checked = check("(each x (get this :items) (get x :price))").unwrap();
        assert_eq!(checked.root().reference(), None);
        match checked.root().kind() {
            TypedKind::Each(binder, _, body) => {
                assert_eq!(binder.name(), "x");
                assert_eq!(
                    checked.refs()[binder.reference()].typ(),
                    &Type::type_ref("Item")
                );
                assert_eq!(checked.refs()[binder.reference()].label(), None);
                assert!(body.reference().is_some());
            }
            kind => panic!("unexpected {:?}", kind),
        }
    }

    #[test]
    fn test_unknown_symbol() {
        assert_eq!(
            check("(get order :id)"),
            Err(SchemaTypeError::UnknownSymbol("order".to_string()))
        );
        assert_eq!(
            check("[(each x (get this :items) x) x]"),
            Err(SchemaTypeError::UnknownSymbol("x".to_string()))
        );
    }

    #[test]
    fn test_missing_field() {
        let error = check("(get this :missing_field)").unwrap_err();
        assert_eq!(
            error,
            SchemaTypeError::MissingField("missing_field".to_string())
        );
        assert!(error.to_string().contains("missing_field"));
    }

    #[test]
    fn test_not_a_record_or_sequence() {
        assert!(matches!(
            check("(get (get this :id) :x)"),
            Err(SchemaTypeError::NotARecord(_))
        ));
        assert!(matches!(
            check("(get (get this :coupon) :discount)"),
            Err(SchemaTypeError::NotARecord(_))
        ));
        assert!(matches!(
            check("(each x (get this :id) x)"),
            Err(SchemaTypeError::NotASequence(_))
        ));
    }

    #[test]
    fn test_if_some_unwraps_optional() {
        let checked = check("(if_some [c (get this :coupon)] (get c :discount) 0)").unwrap();
        match checked.root().kind() {
            TypedKind::IfSome(binder, _, then, _) => {
                assert_eq!(
                    checked.refs()[binder.reference()].typ(),
                    &Type::type_ref("Coupon")
                );
                assert!(then.reference().is_some());
            }
            kind => panic!("unexpected {:?}", kind),
        }
        assert_eq!(
            check("(if_some [c (get this :coupon)] 1 c)"),
            Err(SchemaTypeError::UnknownSymbol("c".to_string()))
        );
    }

    #[test]
    fn test_function_arguments() {
        assert!(check("(total (get this :items))").is_ok());
        assert!(check("(inc (get this :id))").is_ok());
        assert!(check("(inc 1)").is_ok());
        assert!(check("(inc limit)").is_ok());
        assert_eq!(
            check("(inc 1 2)"),
            Err(SchemaTypeError::ArityMismatch("inc".to_string(), 1, 2))
        );
        assert_eq!(
            check("(frobnicate 1)"),
            Err(SchemaTypeError::UnknownFunction("frobnicate".to_string()))
        );
        assert_eq!(
            check("(inc \"one\")"),
            Err(SchemaTypeError::ArgumentMismatch(
                "inc".to_string(),
                0,
                Mismatch::Types(Type::String, Type::Integer)
            ))
        );
        assert_eq!(
            check("(total [])"),
            Err(SchemaTypeError::NoReference("[]".to_string()))
        );
    }

    #[test]
    fn test_incompatible_record() {
        let types = shop_types();
        let functions = Environment::new().with(
            "weigh",
            Function::new(
                vec![Type::sequence(Type::record(vec![("weight", Type::Integer)]))],
                |_| Ok(Value::Null),
            ),
        );
        let result = Checker::new(&types, &functions)
            .bind("this", Type::type_ref("Order"))
            .check(&parse("(weigh (get this :items))").unwrap());
        assert_eq!(
            result,
            Err(SchemaTypeError::ArgumentMismatch(
                "weigh".to_string(),
                0,
                Mismatch::MissingField("weight".to_string())
            ))
        );
    }

    #[test]
    fn test_malformed_forms() {
        assert!(matches!(
            check("(get this)"),
            Err(SchemaTypeError::MalformedForm(..))
        ));
        assert!(matches!(
            check("(each (get this :items) 1)"),
            Err(SchemaTypeError::MalformedForm(..))
        ));
        assert_eq!(
            check("{\"a\" 1}"),
            Err(SchemaTypeError::InvalidMapKey("\"a\"".to_string()))
        );
        assert!(matches!(
            check("((get this :id) 1)"),
            Err(SchemaTypeError::InvalidHead(_))
        ));
    }
}

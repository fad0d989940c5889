use super::{
    ast::Atom,
    checker::{Checked, TypedExpr, TypedKind},
    env::Environment,
    error::{CompileError, EvalError},
    refs::References,
};
use crate::value::{Object, Value};

pub const THIS: &str = "this";

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Const(Value),
    Slot(usize),
    /// A root-level field, read from the request context.
    Context(String),
    Get(Box<Op>, String),
    Each(usize, Box<Op>, Box<Op>),
    If(Box<Op>, Box<Op>, Box<Op>),
    IfSome(usize, Box<Op>, Box<Op>, Box<Op>),
    Call(String, Vec<Op>),
    List(Vec<Op>),
    Map(Vec<(String, Op)>),
}

/// An executable expression.
///
/// Called as `(environment, this, context, options...)`: slot 0 holds
/// `this`, slots `1..=n` the option values, and every `each`/`if_some` binding
/// gets a slot of its own, so a nested binding never clobbers an outer one of
/// the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    op: Op,
    slots: usize,
    options: usize,
}

impl CompiledUnit {
    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn call(
        &self,
        env: &Environment,
        this: &Value,
        ctx: &Value,
        options: &[Value],
    ) -> Result<Value, EvalError> {
        if options.len() != self.options {
            return Err(EvalError::OptionCount(self.options, options.len()));
        }
        let mut frame = Vec::with_capacity(self.slots);
        frame.push(this.clone());
        frame.extend_from_slice(options);
        frame.resize(self.slots, Value::Null);
        eval(&self.op, env, ctx, &mut frame)
    }
}

struct Compiler<'a> {
    refs: &'a References,
    scopes: Vec<(String, usize)>,
    slots: usize,
}

impl Compiler<'_> {
    fn bind(&mut self, name: &str) -> usize {
        let slot = self.slots;
        self.slots += 1;
        self.scopes.push((name.to_string(), slot));
        slot
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scopes
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|&(_, slot)| slot)
    }

    fn scoped(
        &mut self,
        name: &str,
        body: &TypedExpr,
    ) -> Result<(usize, Op), CompileError> {
        let slot = self.bind(name);
        let op = self.compile(body);
        self.scopes.pop();
        Ok((slot, op?))
    }

    fn compile(&mut self, expr: &TypedExpr) -> Result<Op, CompileError> {
        Ok(match expr.kind() {
            TypedKind::Symbol(name) => match self.lookup(name) {
                Some(slot) => Op::Slot(slot),
                None => match expr.reference() {
                    Some(reference) => match self.refs.get(reference) {
                        Some(root) if root.backref().is_none() => Op::Context(name.clone()),
                        Some(_) => return Err(CompileError::UnboundVariable(name.clone())),
                        None => return Err(CompileError::DanglingReference(reference.index())),
                    },
                    None => return Err(CompileError::UnboundVariable(name.clone())),
                },
            },
            TypedKind::Constant(atom) => Op::Const(match atom {
                Atom::Nil => Value::Null,
                Atom::Boolean(x) => Value::Boolean(*x),
                Atom::Integer(x) => Value::Integer(*x),
                Atom::Float(x) => Value::Float(*x),
                Atom::String(x) | Atom::Keyword(x) => Value::String(x.clone()),
            }),
            TypedKind::Get(obj, name) => Op::Get(Box::new(self.compile(obj)?), name.clone()),
            TypedKind::Each(binder, collection, body) => {
                let collection = self.compile(collection)?;
                let (slot, body) = self.scoped(binder.name(), body)?;
                Op::Each(slot, Box::new(collection), Box::new(body))
            }
            TypedKind::If(test, then, otherwise) => Op::If(
                Box::new(self.compile(test)?),
                Box::new(self.compile(then)?),
                Box::new(self.compile(otherwise)?),
            ),
            TypedKind::IfSome(binder, bind, then, otherwise) => {
                let bind = self.compile(bind)?;
                let (slot, then) = self.scoped(binder.name(), then)?;
                let otherwise = self.compile(otherwise)?;
                Op::IfSome(slot, Box::new(bind), Box::new(then), Box::new(otherwise))
            }
            TypedKind::Call(name, _, args) => Op::Call(
                name.clone(),
                args.iter()
                    .map(|arg| self.compile(arg))
                    .collect::<Result<_, _>>()?,
            ),
            TypedKind::List(items) => Op::List(
                items
                    .iter()
                    .map(|item| self.compile(item))
                    .collect::<Result<_, _>>()?,
            ),
            TypedKind::Map(entries) => Op::Map(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), self.compile(value)?)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// Compiles a checked expression whose roots were `this`, the given option
/// names and the graph root fields.
pub fn compile(checked: &Checked, options: &[&str]) -> Result<CompiledUnit, CompileError> {
    let mut compiler = Compiler {
        refs: checked.refs(),
        scopes: vec![],
        slots: 0,
    };
    compiler.bind(THIS);
    for option in options {
        compiler.bind(option);
    }
    let op = compiler.compile(checked.root())?;
    Ok(CompiledUnit {
        op,
        slots: compiler.slots,
        options: options.len(),
    })
}

fn attribute<'v>(value: &'v Value, name: &str) -> Result<&'v Value, EvalError> {
    match value {
        Value::Object(object) => object
            .get(name)
            .ok_or_else(|| EvalError::MissingAttribute(name.to_string(), "object".to_string())),
        value => Err(EvalError::MissingAttribute(
            name.to_string(),
            value.kind().to_string(),
        )),
    }
}

/// Follows a chain of `get`s rooted at a slot or the context by reference;
/// `None` when `op` is not such a chain.
fn resolve_path<'v>(
    op: &Op,
    ctx: &'v Value,
    frame: &'v [Value],
) -> Option<Result<&'v Value, EvalError>> {
    match op {
        Op::Slot(slot) => Some(Ok(&frame[*slot])),
        Op::Context(name) => Some(
            ctx.get(name)
                .ok_or_else(|| EvalError::MissingContext(name.clone())),
        ),
        Op::Get(obj, name) => {
            Some(resolve_path(obj, ctx, frame)?.and_then(|value| attribute(value, name)))
        }
        _ => None,
    }
}

fn eval(op: &Op, env: &Environment, ctx: &Value, frame: &mut [Value]) -> Result<Value, EvalError> {
    match op {
        Op::Const(value) => Ok(value.clone()),
        Op::Slot(slot) => Ok(frame[*slot].clone()),
        Op::Context(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::MissingContext(name.clone())),
        Op::Get(obj, name) => {
            let path = resolve_path(obj, ctx, frame)
                .map(|value| value.and_then(|value| attribute(value, name)).cloned());
            match path {
                Some(value) => value,
                None => match eval(obj, env, ctx, frame)? {
                    Value::Object(mut object) => object.shift_remove(name).ok_or_else(|| {
                        EvalError::MissingAttribute(name.clone(), "object".to_string())
                    }),
                    value => Err(EvalError::MissingAttribute(
                        name.clone(),
                        value.kind().to_string(),
                    )),
                },
            }
        }
        Op::Each(slot, collection, body) => match eval(collection, env, ctx, frame)? {
            Value::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    frame[*slot] = item;
                    values.push(eval(body, env, ctx, frame)?);
                }
                Ok(Value::List(values))
            }
            value => Err(EvalError::UnexpectedValue("list", value.kind())),
        },
        Op::If(test, then, otherwise) => {
            if eval(test, env, ctx, frame)?.is_truthy() {
                eval(then, env, ctx, frame)
            } else {
                eval(otherwise, env, ctx, frame)
            }
        }
        Op::IfSome(slot, bind, then, otherwise) => match eval(bind, env, ctx, frame)? {
            Value::Null => eval(otherwise, env, ctx, frame),
            value => {
                frame[*slot] = value;
                eval(then, env, ctx, frame)
            }
        },
        Op::Call(name, args) => {
            let function = env
                .get(name)
                .ok_or_else(|| EvalError::UndefinedFunction(name.clone()))?;
            let args = args
                .iter()
                .map(|arg| eval(arg, env, ctx, frame))
                .collect::<Result<Vec<_>, _>>()?;
            function
                .call(&args)
                .map_err(|message| EvalError::Function(name.clone(), message))
        }
        Op::List(items) => Ok(Value::List(
            items
                .iter()
                .map(|item| eval(item, env, ctx, frame))
                .collect::<Result<_, _>>()?,
        )),
        Op::Map(entries) => Ok(Value::Object(
            entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), eval(value, env, ctx, frame)?)))
                .collect::<Result<Object, EvalError>>()?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        expr::{parse, Checker, Function},
        types::{Type, Types},
    };

    fn types() -> Types {
        let mut types = Types::new();
        types.insert(
            "Order",
            Type::record(vec![
                ("items", Type::sequence(Type::type_ref("Item"))),
                ("coupon", Type::optional(Type::type_ref("Coupon"))),
            ]),
        );
        types.insert(
            "Item",
            Type::record(vec![
                ("price", Type::Integer),
                ("parts", Type::sequence(Type::type_ref("Item"))),
            ]),
        );
        types.insert("Coupon", Type::record(vec![("discount", Type::Integer)]));
        types.insert("Shop", Type::record(vec![("currency", Type::String)]));
        types
    }

    fn env() -> Environment {
        Environment::new().with(
            "add",
            Function::new(vec![Type::Integer, Type::Integer], |args| match args {
                [Value::Integer(a), Value::Integer(b)] => Ok(Value::Integer(a + b)),
                _ => Err("expected two integers".to_string()),
            }),
        )
    }

    fn compile_source(source: &str) -> CompiledUnit {
        let types = types();
        let env = env();
        let checked = Checker::new(&types, &env)
            .bind("shop", Type::type_ref("Shop"))
            .bind("this", Type::type_ref("Order"))
            .bind("bonus", Type::Integer)
            .check(&parse(source).unwrap())
            .unwrap();
        compile(&checked, &["bonus"]).unwrap()
    }

    fn item(price: i64, parts: Vec<Value>) -> Value {
        Value::object(vec![
            ("price", Value::from(price)),
            ("parts", Value::List(parts)),
        ])
    }

    fn order() -> Value {
        Value::object(vec![
            (
                "items",
                Value::List(vec![
                    item(3, vec![item(1, vec![])]),
                    item(5, vec![item(2, vec![]), item(4, vec![])]),
                ]),
            ),
            ("coupon", Value::Null),
        ])
    }

    #[test]
    fn test_each() {
        let unit = compile_source("(each x (get this :items) (get x :price))");
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[Value::from(0)]),
            Ok(Value::from(vec![3, 5]))
        );
    }

    #[test]
    fn test_nested_each_shadowing() {
        let unit = compile_source(
            "(each x (get this :items) [(get x :price) (each x (get x :parts) (get x :price))])",
        );
        assert_eq!(unit.slots(), 4);
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[Value::from(0)]),
            Ok(Value::List(vec![
                Value::List(vec![Value::from(3), Value::from(vec![1])]),
                Value::List(vec![Value::from(5), Value::from(vec![2, 4])]),
            ]))
        );
    }

    #[test]
    fn test_options_and_functions() {
        let unit = compile_source("(each x (get this :items) (add (get x :price) bonus))");
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[Value::from(10)]),
            Ok(Value::from(vec![13, 15]))
        );
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[]),
            Err(EvalError::OptionCount(1, 0))
        );
        assert_eq!(
            unit.call(&Environment::new(), &order(), &Value::Null, &[Value::from(1)]),
            Err(EvalError::UndefinedFunction("add".to_string()))
        );
    }

    #[test]
    fn test_if_some_and_if() {
        let unit = compile_source(
            "(if_some [c (get this :coupon)] (get c :discount) (if bonus :bonus :none))",
        );
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[Value::from(1)]),
            Ok(Value::from("bonus"))
        );
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[Value::from(0)]),
            Ok(Value::from("none"))
        );
        let with_coupon = Value::object(vec![
            ("items", Value::List(vec![])),
            ("coupon", Value::object(vec![("discount", Value::from(7))])),
        ]);
        assert_eq!(
            unit.call(&env(), &with_coupon, &Value::Null, &[Value::from(0)]),
            Ok(Value::from(7))
        );
    }

    #[test]
    fn test_context() {
        let unit = compile_source("{:currency (get shop :currency) :n (add 1 2)}");
        let ctx = Value::object(vec![(
            "shop",
            Value::object(vec![("currency", Value::from("EUR"))]),
        )]);
        assert_eq!(
            unit.call(&env(), &order(), &ctx, &[Value::from(0)]),
            Ok(Value::object(vec![
                ("currency", Value::from("EUR")),
                ("n", Value::from(3)),
            ]))
        );
        assert_eq!(
            unit.call(&env(), &order(), &Value::Null, &[Value::from(0)]),
            Err(EvalError::MissingContext("shop".to_string()))
        );
    }

    #[test]
    fn test_bad_data() {
        let unit = compile_source("(each x (get this :items) (add (get x :price) bonus))");
        assert_eq!(
            unit.call(
                &env(),
                &Value::object(vec![("id", Value::from(1))]),
                &Value::Null,
                &[Value::from(0)]
            ),
            Err(EvalError::MissingAttribute("items".to_string(), "object".to_string()))
        );
        let this = Value::object(vec![(
            "items",
            Value::List(vec![Value::object(vec![("price", Value::from("free"))])]),
        )]);
        assert_eq!(
            unit.call(&env(), &this, &Value::Null, &[Value::from(0)]),
            Err(EvalError::Function(
                "add".to_string(),
                "expected two integers".to_string()
            ))
        );
    }

    #[test]
    fn test_get_chains() {
        let get = |obj: Op, name: &str| Op::Get(Box::new(obj), name.to_string());
        let frame = [order()];
        let ctx = Value::object(vec![(
            "shop",
            Value::object(vec![("currency", Value::from("EUR"))]),
        )]);
        let path = get(Op::Context("shop".to_string()), "currency");
        let currency = ctx.get("shop").and_then(|shop| shop.get("currency")).unwrap();
        assert!(matches!(
            resolve_path(&path, &ctx, &frame),
            Some(Ok(value)) if std::ptr::eq(value, currency)
        ));
        assert_eq!(
            resolve_path(&get(Op::Slot(0), "missing"), &ctx, &frame),
            Some(Err(EvalError::MissingAttribute(
                "missing".to_string(),
                "object".to_string()
            )))
        );
        let literal = get(
            Op::Map(vec![("a".to_string(), Op::Const(Value::from(1)))]),
            "a",
        );
        assert!(resolve_path(&literal, &ctx, &frame).is_none());
        assert_eq!(
            eval(&literal, &env(), &ctx, &mut [Value::Null]),
            Ok(Value::from(1))
        );
    }
}

use crate::{types::Type, value::Value};
use indexmap::IndexMap;
use std::{fmt, sync::Arc};

pub type Implementation = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// A function callable from expressions.
///
/// Parameter types double as requirement templates: a record-like parameter
/// makes every listed field of the argument a requirement.
#[derive(Clone)]
pub struct Function {
    params: Vec<Type>,
    implementation: Implementation,
}

impl Function {
    pub fn new<F>(params: Vec<Type>, implementation: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            params,
            implementation: Arc::new(implementation),
        }
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.implementation)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Functions by name.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    functions: IndexMap<String, Function>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, function: Function) -> Self {
        self.insert(name, function);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, function: Function) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

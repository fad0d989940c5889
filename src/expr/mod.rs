//! The expression language of computed fields: parsing, type checking,
//! requirement extraction and compilation.

pub use ast::{Atom, Expr};
pub use checker::{Binder, Checked, Checker, TypedExpr, TypedKind};
pub use compiler::{compile, CompiledUnit, THIS};
pub use env::{Environment, Function, Implementation};
pub use error::{CompileError, EvalError, ParseError, SchemaTypeError};
pub use parser::{parse, Rule};
pub use refs::{RefId, Reference, References};
pub use requirements::{extract, type_to_query};

mod ast;
mod checker;
mod compiler;
mod env;
mod error;
mod parser;
mod refs;
mod requirements;

use super::Rule;
use crate::types::Mismatch;
use derive_more::Display;

pub type ParseError = pest::error::Error<Rule>;

/// An expression does not fit the graph schema.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum SchemaTypeError {
    #[display(fmt = "Unknown symbol \"{}\"", _0)]
    UnknownSymbol(String),
    #[display(fmt = "Unknown function \"{}\"", _0)]
    UnknownFunction(String),
    #[display(fmt = "Wrong arguments count at \"{}\" function: expected {}, got {}", _0, _1, _2)]
    ArityMismatch(String, usize, usize),
    #[display(fmt = "Missing field \"{}\"", _0)]
    MissingField(String),
    #[display(fmt = "Not a record: {}", _0)]
    NotARecord(String),
    #[display(fmt = "Not a sequence: {}", _0)]
    NotASequence(String),
    #[display(fmt = "Invalid argument {} of \"{}\": {}", _1, _0, _2)]
    ArgumentMismatch(String, usize, Mismatch),
    #[display(fmt = "Expression does not refer to graph data: {}", _0)]
    NoReference(String),
    #[display(fmt = "Malformed \"{}\" form: {}", _0, _1)]
    MalformedForm(String, String),
    #[display(fmt = "Map keys must be keywords: {}", _0)]
    InvalidMapKey(String),
    #[display(fmt = "Application head must be a symbol: {}", _0)]
    InvalidHead(String),
}

impl std::error::Error for SchemaTypeError {}

/// A checked tree reached the compiler in a shape the checker never emits.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum CompileError {
    #[display(fmt = "Unbound variable \"{}\"", _0)]
    UnboundVariable(String),
    #[display(fmt = "Dangling reference #{}", _0)]
    DanglingReference(usize),
}

impl std::error::Error for CompileError {}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum EvalError {
    #[display(fmt = "Function \"{}\" is not defined in the environment", _0)]
    UndefinedFunction(String),
    #[display(fmt = "Missing value for context field \"{}\"", _0)]
    MissingContext(String),
    #[display(fmt = "Missing attribute \"{}\" in {}", _0, _1)]
    MissingAttribute(String, String),
    #[display(fmt = "Expected {}, got {}", _0, _1)]
    UnexpectedValue(&'static str, &'static str),
    #[display(fmt = "Expected {} option value(s), got {}", _0, _1)]
    OptionCount(usize, usize),
    #[display(fmt = "Function \"{}\" failed: {}", _0, _1)]
    Function(String, String),
}

impl std::error::Error for EvalError {}

use crate::expr::{CompileError, ParseError, SchemaTypeError};
use derive_more::{Display, From};

/// Failure to build a schema.
#[derive(Debug, Display, From, Clone, PartialEq)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    Parse(Box<ParseError>),
    #[display(fmt = "{}", _0)]
    Type(SchemaTypeError),
    #[display(fmt = "{}", _0)]
    Compile(CompileError),
    #[from(ignore)]
    #[display(fmt = "Unknown node \"{}\"", _0)]
    UnknownNode(String),
    #[from(ignore)]
    #[display(fmt = "Field \"{}\" is already defined", _0)]
    DuplicateField(String),
    #[from(ignore)]
    #[display(fmt = "Invalid option \"{}\" of \"{}\"", _1, _0)]
    InvalidOption(String, String),
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::Parse(Box::new(error))
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

use derive_more::Display;

/// Two selections under one result key cannot be combined.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum QueryMergeError {
    #[display(fmt = "Distinct selections with same result name \"{}\"", _0)]
    DistinctSelections(String),
    #[display(fmt = "Field and link selected with same result name \"{}\"", _0)]
    FieldLinkCollision(String),
}

impl std::error::Error for QueryMergeError {}

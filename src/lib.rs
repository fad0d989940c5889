//! Linked graph queries with computed fields.
//!
//! Query trees are merged into one canonical tree per request, and computed
//! fields, small expressions over graph data, are checked, reduced to the data
//! they require and compiled once per schema. At request time the requirements
//! of every requested computed field are fetched in a single batch.

pub mod error;
pub mod executor;
pub mod expr;
pub mod graph;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{Error, Result};

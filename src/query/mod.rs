//! Query trees and their merging.

pub use error::QueryMergeError;
pub use merge::{merge, merge_requirements};
pub use merger::{MergeOptions, OverlappingInterfaces, QueryMerger};
pub use node::{Directive, Field, Fragment, Link, Node, Options, Selection};

mod error;
mod merge;
mod merger;
mod node;

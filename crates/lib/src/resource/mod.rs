//! The resource model: typed nodes with property bags and forward references.

mod types;

pub use types::*;

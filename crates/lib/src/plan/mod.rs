//! Plans: the operations that move applied state to the desired stack.

mod diff;

pub use diff::*;

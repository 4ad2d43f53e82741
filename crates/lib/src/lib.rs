//! stackup-lib: declarative resource graphs for small cloud stacks.
//!
//! A stack is declared through an explicit [`stack::StackBuilder`] (from Rust
//! or a Lua `setup(stack)` function), then:
//! - [`grant`] expands permission grants into Policy nodes
//! - [`resolve`] turns property references into dependency edges
//! - [`execute::dag`] orders the graph
//! - [`plan`] diffs it against the persisted [`state::AppliedState`]
//! - [`execute`] runs the plan against a [`backend::ProvisioningBackend`]

pub mod backend;
pub mod consts;
pub mod eval;
pub mod execute;
pub mod grant;
pub mod init;
pub mod lua;
pub mod plan;
pub mod platform;
pub mod resolve;
pub mod resource;
pub mod stack;
pub mod state;
pub mod util;

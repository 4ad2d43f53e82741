//! Lua declaration surface.
//!
//! - [`runtime`] - VM creation and config file loading
//! - [`stack`] - the `stack` builder object handed to `setup(stack)`
//! - [`convert`] - Lua values to resource properties and references

pub mod convert;
pub mod runtime;
pub mod stack;

//! Galley: recipe-driven data transformation engine.
//!
//! A typed dish flows through an ordered recipe of operations. Flow-control
//! operations rewrite the interpreter state to jump, fork and stash values.
//! Magic searches for operation chains that decode unknown data.

pub mod cli;
pub mod core;
pub mod flow;
pub mod magic;
pub mod ops;

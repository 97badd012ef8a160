//! Core engine: types, dish, operation contract, recipe loading, interpreter and chef.

pub mod chef;
pub mod codec;
pub mod config;
pub mod dish;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod operation;
pub mod recipe;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod testkit;

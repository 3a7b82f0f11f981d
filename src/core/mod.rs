//! Core types: error model and the route-as-tool contract.

pub mod error;
pub mod tool;

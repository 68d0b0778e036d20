//! CLI command implementations.

pub mod common;
pub mod layers;
pub mod render;
pub mod validate;

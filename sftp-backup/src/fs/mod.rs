//! Local filesystem helpers: ignore patterns and staging-tree traversal.

pub mod ignore;
pub mod walker;

pub use ignore::{load_patterns, matches, IgnoreList};

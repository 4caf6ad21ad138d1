//! Response read filtering.
//!
//! - [`node`] - declared type to [`FilterNode`] compilation with cycle cut
//! - [`walk`] - value projection through a compiled node
//! - [`cache`] - compiled nodes shared across requests

pub mod cache;
pub mod node;
pub mod walk;

pub use cache::FilterCache;
pub use node::{ClassNode, FilterNode, PropertyNode};
pub use walk::{FieldTransform, ResponseFilter};

//! Storage backend traits.

mod graph;
mod memory_log;
mod vector;

pub use graph::{EntityQuery, GraphStore};
pub use memory_log::MemoryLog;
pub use vector::{VectorFilter, VectorIndex};

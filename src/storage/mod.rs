//! Storage layer: capability traits plus in-memory reference backends.
//!
//! The vector index and the graph store are populated by an external
//! content-ingestion pipeline and treated as read interfaces by the engine;
//! the memory log is the one store the engine writes on the hot path, and
//! it is append-only.

pub mod graph;
pub mod memory_log;
pub mod traits;
pub mod vector;

pub use graph::InMemoryGraphStore;
pub use memory_log::InMemoryMemoryLog;
pub use traits::{EntityQuery, GraphStore, MemoryLog, VectorFilter, VectorIndex};
pub use vector::InMemoryVectorIndex;

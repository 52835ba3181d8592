//! Vector index backends.

mod in_memory;

pub use in_memory::InMemoryVectorIndex;

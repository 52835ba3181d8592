//! Memory log backends.

mod in_memory;

pub use in_memory::InMemoryMemoryLog;

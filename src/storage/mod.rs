//! Property values and the in-memory backing store.

mod memory;
pub mod props;

pub use memory::MemoryStore;
pub use props::{DefinedProperty, Property, Value};

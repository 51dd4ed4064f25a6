mod descriptor;
mod state;

pub use descriptor::{IndexDescriptor, InternalIndexState, UniquenessConstraint};
pub use state::{SchemaGeneration, SchemaStateCache, SchemaStateStats};

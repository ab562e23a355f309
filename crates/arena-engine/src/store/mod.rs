//! Entity store.
//!
//! Persistence proper is an external collaborator; the engine consumes
//! repository-shaped access to its entities. The in-memory
//! implementation backs tests, dry runs and the single-process server.

mod memory;

pub use memory::{MemoryStore, StoreError};

mod in_memory;
mod store;

pub use in_memory::InMemorySnapshotStore;
pub use store::{SnapshotRecord, SnapshotStore};

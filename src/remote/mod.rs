mod identity;
mod in_memory;
mod store;

pub use identity::{IdentityProvider, SessionIdentity};
pub use in_memory::{InMemoryRemoteStore, RemoteOp};
pub use store::RemoteStore;

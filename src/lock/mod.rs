mod entity_locks;

pub use entity_locks::EntityLocks;

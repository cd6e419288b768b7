mod follows;
mod image;
mod likes;
mod relation_cache;

pub use relation_cache::RelationCache;

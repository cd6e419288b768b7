//! relation_cache integration tests.

mod likes;
mod follows;
mod session;

// src/database/mod.rs
pub mod pool;

pub use pool::{create_pool, DbPool};

// src/lib.rs
pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod pbx;
pub mod services;
pub mod store;
pub mod stream;

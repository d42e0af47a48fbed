// src/stream/mod.rs
pub mod client;
pub mod event;

pub use client::EventStreamClient;
pub use event::StreamEvent;

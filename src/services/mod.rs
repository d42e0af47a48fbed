// src/services/mod.rs
pub mod balance_sweep;
pub mod call_session;

pub use balance_sweep::BalanceSweep;
pub use call_session::CallSessionEngine;

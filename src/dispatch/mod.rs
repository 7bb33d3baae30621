//! Concurrent dispatch of work units to the fix agent

pub mod agent;
pub mod pool;
pub mod render;
pub mod worker;

pub use agent::DroidAgent;
pub use pool::{DispatchReport, dispatch};
pub use worker::RetryPolicy;

//! Proxy module: candidates, the rotating pool and its public sources

mod candidate;
mod pool;
pub mod sources;
pub mod validator;

pub use candidate::{Egress, ProxyCandidate, ProxyProtocol};
pub use pool::ProxyPool;

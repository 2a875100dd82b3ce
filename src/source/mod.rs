//! Source state store and circuit breaker.

pub mod breaker;
pub mod repository;
pub mod types;

pub use breaker::{BreakerState, CircuitBreaker};
pub use repository::SourceRepository;
pub use types::{NewSource, Source};

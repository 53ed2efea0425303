//! Concrete adapters for the ports declared in `domain::ports`.

pub mod exchange;
pub mod notifications;
pub mod observability;
pub mod persistence;

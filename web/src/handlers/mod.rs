//! HTTP request handlers, one module per endpoint group.

pub mod authorize;
pub mod cloud;
pub mod components;
pub mod dirty;
pub mod health;
pub mod tickets;

pub use health::health_check;

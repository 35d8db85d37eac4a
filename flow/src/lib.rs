//! # DBM Flow
//!
//! Ticket flow planning and flow components.
//!
//! - [`builders`]: validate ticket details per ticket type and plan the
//!   flows (resource apply, inner flow, host recycle) a ticket runs
//! - [`components`]: atomic flow steps executed by controller scenes, such
//!   as toggling `SQLServer` application logins or writing Kafka config
//!
//! Builders read metadata through [`dbm_core::MetaStore`]; components call
//! external services through the `dbm-clients` traits, so both run against
//! the doubles in `dbm-testing`.

#![forbid(unsafe_code)]

pub mod builders;
pub mod components;
pub mod error;

pub use builders::{BuilderFactory, FlowPlan, FlowSpec, Registration, SceneRef, TicketFlowBuilder};
pub use components::{Component, ComponentData, ComponentLibrary, Service};
pub use error::{BuilderError, FlowError};

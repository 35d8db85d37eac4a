//! # DBM Core
//!
//! Domain types for the DB management backend.
//!
//! This crate holds everything the other crates agree on:
//!
//! - **Constants**: pool, ticket, extension and cluster enums with their wire values
//! - **Models**: persisted records (`DirtyMachine`, `MachineEvent`, `DBExtension`, ...)
//! - **Filters**: listing filters with reference matching semantics
//! - **Pagination**: limit/offset windows and paged results
//! - **Stores**: dyn-compatible persistence traits
//! - **Environment**: injected clock
//!
//! No I/O happens here; `dbm-postgres` and `dbm-testing` implement the store
//! traits, `dbm-web` and `dbm-flow` consume them.

#![forbid(unsafe_code)]

pub mod constants;
pub mod environment;
pub mod filter;
pub mod models;
pub mod pagination;
pub mod store;

pub use chrono::{DateTime, Utc};
pub use constants::{
    ClusterPhase, ClusterType, ExtensionServiceStatus, ExtensionType, FlowRetryType,
    MachineEventType, PoolType, TicketType, UnknownVariant,
};
pub use pagination::{Page, Paged};
pub use store::{DirtyPoolStore, MetaStore, ProxyStore, StoreError, StoreFuture, StoreResult};

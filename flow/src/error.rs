//! Error types for flow building and component execution.

use dbm_clients::ApiError;
use dbm_core::{StoreError, TicketType};
use thiserror::Error;

/// Errors raised while validating a ticket and planning its flows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// Ticket details failed validation.
    #[error("{0}")]
    Validation(String),

    /// No builder is registered for the ticket type.
    #[error("ticket type {0} has no registered flow builder")]
    NotRegistered(TicketType),

    /// Metadata lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BuilderError {
    /// Shorthand for [`BuilderError::Validation`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Errors raised by flow components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The cluster has no storage instance on the requested IP.
    #[error("cluster [{domain}] has no instance on ip [{ip}], please contact the system administrator")]
    InstanceNotFound {
        /// Cluster access domain.
        domain: String,
        /// Requested IP.
        ip: String,
    },

    /// A required input key is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// An input is present but malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No component is registered under the code.
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// Metadata lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// External service call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

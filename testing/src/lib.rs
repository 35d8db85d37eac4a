//! # DBM Testing
//!
//! Testing utilities for the DB management backend.
//!
//! This crate provides:
//! - [`InMemoryStore`]: every store trait over in-process collections
//! - Recording doubles of the external service clients
//! - [`FixedClock`] for deterministic timestamps
//! - Fixture builders for hosts, tickets and clusters
//!
//! ## Example
//!
//! ```
//! use dbm_core::{DirtyPoolStore, PoolType};
//! use dbm_testing::{InMemoryStore, fixtures};
//!
//! # async fn example() -> Result<(), dbm_core::StoreError> {
//! let store = InMemoryStore::new();
//! store.insert_machine(fixtures::machine(1, "1.1.1.1", PoolType::Dirty));
//!
//! let machines = store.list_dirty_machines(vec![1]).await?;
//! assert_eq!(machines.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod api_mocks;
pub mod fixtures;
pub mod store;

use chrono::{DateTime, Utc};
use dbm_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use dbm_testing::mocks::FixedClock;
    /// use dbm_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Fixed clock at 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }
}

pub use api_mocks::{MockDbConfigApi, MockDrsApi, MockPrivManagerApi};
pub use mocks::{FixedClock, test_clock};
pub use store::InMemoryStore;

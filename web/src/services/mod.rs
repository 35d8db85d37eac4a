//! Request-independent operations behind the handlers.

pub mod authorize;
pub mod cloud;
pub mod dirty;

pub use authorize::{PreCheckResult, SqlserverAuthorizeHandler, SqlserverAuthorizeMeta};
pub use cloud::{CloudService, InsertExtension};
pub use dirty::{DirtyMachineRecord, DirtyMachineService, MachineEventRecord, TransferRequest};

//! Platform abstraction for the framework's critical sections.
//!
//! Every piece of state shared between event producers and the scheduler
//! (ready set, pools, queues) is guarded by the `Mutex` exported here. On a
//! hosted target (`std` feature, the default) that is `parking_lot::Mutex`;
//! with the `lock-free` feature a `spin::Mutex` takes its place so the same
//! code can serve targets without an OS. The rest of the crate never names
//! the concrete lock, only this module.

#[cfg(feature = "std")]
pub use parking_lot::{Mutex, MutexGuard};

#[cfg(all(not(feature = "std"), feature = "lock-free"))]
pub use spin::{Mutex, MutexGuard};

pub use std::sync::Arc;

//! Lock resources, the lock manager seam and the per-transaction lock holder.

mod holder;
mod manager;
mod resource;

pub use holder::{LockHolder, ReleasableLock};
pub use manager::{InProcessLockManager, LockManager};
pub use resource::{LockClientId, LockResource, LockType};

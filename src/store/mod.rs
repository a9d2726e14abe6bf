//! Committed state behind the kernel: the read layer, the commit process, index
//! providers, token holders and the in-memory reference store.

mod command;
mod commit;
mod constraint_index;
mod guard;
mod index;
mod memory;
mod read;
mod tokens;

pub use command::{Command, TransactionHeader, TransactionRepresentation};
pub(crate) use command::now_millis;
pub use commit::TransactionCommitProcess;
pub use constraint_index::{ConstraintIndexCreator, StoreConstraintIndexCreator};
pub use guard::{Guard, NoopGuard, TimeoutGuard};
pub use index::{
    IndexFailure, IndexProvider, IndexProviderMap, InMemoryIndexProvider, IN_MEMORY_PROVIDER,
};
pub use memory::InMemoryStore;
pub use read::StoreReadLayer;
pub use tokens::{TokenHolder, TokenHolders};

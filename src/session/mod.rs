pub mod audit_log;
pub mod refresh;
pub mod role;
pub mod store;

pub use refresh::{RefreshCoordinator, Ticket};
pub use role::Role;
pub use store::{CredentialStore, FileStore, KeyValueStore, MemoryStore, SessionCredential, StoredUser};

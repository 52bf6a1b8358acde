pub mod error;
pub mod file_store;
pub mod keys;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use error::{PersistError, Result};
pub use file_store::FileStore;
pub use keys::StorageKeys;
pub use session::{SessionSettings, SessionStore};
pub use snapshot::SessionSnapshot;
pub use store::{KeyValueStore, MemoryStore};
pub use writer::{SnapshotWriter, WriterConfig};

//! Profile persistence — trait seam plus libSQL and in-memory backends.

pub mod libsql_backend;
pub mod memory;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::profile::Profile;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;

/// Backend-agnostic profile storage.
///
/// Writes are assumed atomic per row; callers persist fully-computed
/// states and never need partial-write recovery.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile by Telegram user id.
    async fn load(&self, user_id: i64) -> Result<Option<Profile>, StorageError>;

    /// Write a profile, inserting or replacing its row.
    async fn save(&self, profile: &Profile) -> Result<(), StorageError>;
}

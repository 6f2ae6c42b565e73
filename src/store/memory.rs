//! In-memory profile store for tests and ephemeral runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::profile::Profile;
use crate::store::ProfileStore;

/// HashMap-backed store with the same contract as the real backend.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<i64, Profile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load(&self, user_id: i64) -> Result<Option<Profile>, StorageError> {
        Ok(self.profiles.lock().await.get(&user_id).cloned())
    }

    async fn save(&self, profile: &Profile) -> Result<(), StorageError> {
        self.profiles
            .lock()
            .await
            .insert(profile.user_id(), profile.clone());
        Ok(())
    }
}

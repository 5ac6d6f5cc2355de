use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::StoreResult;

/// Monitor request waiting for the user to pick a date range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingSetup {
    /// URL variant that worked when the request was previewed
    pub url: String,
    /// Date as echoed by the search page
    pub display_date: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user setup state with expiry. Entries older than their TTL are gone.
#[async_trait]
pub trait SetupSessionStore: Send + Sync {
    async fn put(&self, user_id: i64, setup: &PendingSetup, ttl: Duration) -> StoreResult<()>;

    /// Read and remove the pending setup of a user
    async fn take(&self, user_id: i64) -> StoreResult<Option<PendingSetup>>;
}

/// Pending setups held in process memory; expired entries are dropped on read
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<i64, (PendingSetup, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SetupSessionStore for MemorySessionStore {
    async fn put(&self, user_id: i64, setup: &PendingSetup, ttl: Duration) -> StoreResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "session store lock poisoned")?;
        entries.retain(|_, (_, expires)| *expires > Instant::now());
        entries.insert(user_id, (setup.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn take(&self, user_id: i64) -> StoreResult<Option<PendingSetup>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "session store lock poisoned")?;
        Ok(entries
            .remove(&user_id)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(setup, _)| setup))
    }
}

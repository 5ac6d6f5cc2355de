use std::time::Duration;

use async_trait::async_trait;
use farewatch_core::repository::StoreResult;
use farewatch_core::session_store::{PendingSetup, SetupSessionStore};
use redis::AsyncCommands;
use tracing::info;

/// Pending setups kept in Redis as JSON with an expiry
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(user_id: i64) -> String {
        format!("setup:{}", user_id)
    }
}

#[async_trait]
impl SetupSessionStore for RedisSessionStore {
    async fn put(&self, user_id: i64, setup: &PendingSetup, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(setup)?;
        conn.set_ex::<_, _, ()>(Self::key(user_id), payload, ttl.as_secs().max(1))
            .await?;
        info!(user_id, "Setup session stored for {}s", ttl.as_secs());
        Ok(())
    }

    async fn take(&self, user_id: i64) -> StoreResult<Option<PendingSetup>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::key(user_id);

        let (payload, _removed): (Option<String>, i64) = redis::pipe()
            .atomic()
            .get(&key)
            .del(&key)
            .query_async(&mut conn)
            .await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

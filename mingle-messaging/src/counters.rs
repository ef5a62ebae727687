use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use mingle_shared::clients::redis::RedisClient;
use mingle_shared::errors::{AppError, AppResult, ErrorCode};

use crate::schema::conversations;

/// Unread-count tracker over two backends: durable per-conversation counters
/// in the `conversations` table (authoritative, written transactionally with
/// message inserts) and Redis counters for low-latency reads.
///
/// Every cache-tier operation is best-effort: a Redis failure is logged and
/// absorbed, and readers fall back to the durable counters on miss or error.
pub struct UnreadCounters {
    redis: RedisClient,
    ttl_secs: u64,
}

fn total_key(user_id: Uuid) -> String {
    format!("unread:{user_id}")
}

fn conversation_key(user_id: Uuid, conversation_id: Uuid) -> String {
    format!("unread:{user_id}:{conversation_id}")
}

impl UnreadCounters {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    // --- cache tier ---

    async fn incr_key(&self, key: &str, by: i64) {
        match self.redis.incr_by(key, by).await {
            Ok(_) => {
                if let Err(e) = self.redis.expire(key, self.ttl_secs as i64).await {
                    tracing::warn!(error = %e, key = %key, "unread cache expire failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "unread cache increment failed");
            }
        }
    }

    pub async fn incr_total(&self, user_id: Uuid, by: i64) {
        self.incr_key(&total_key(user_id), by).await;
    }

    pub async fn incr_conversation(&self, user_id: Uuid, conversation_id: Uuid, by: i64) {
        self.incr_key(&conversation_key(user_id, conversation_id), by).await;
    }

    /// Increment the user's total and per-conversation counters after a
    /// message landed durably.
    pub async fn bump(&self, user_id: Uuid, conversation_id: Uuid, by: i64) {
        self.incr_total(user_id, by).await;
        self.incr_conversation(user_id, conversation_id, by).await;
    }

    /// Decrement the user's total counter, clamping at zero. A result below
    /// zero means a missed increment or a double decrement; it is logged as a
    /// consistency warning, never an error.
    pub async fn drop_total(&self, user_id: Uuid, by: i64) {
        let key = total_key(user_id);
        match self.redis.decr_by(&key, by).await {
            Ok(value) if value < 0 => {
                tracing::warn!(key = %key, value, "unread cache total underflow, clamping to zero");
                if let Err(e) = self.redis.set_i64(&key, 0, self.ttl_secs).await {
                    tracing::warn!(error = %e, key = %key, "unread cache clamp failed");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "unread cache decrement failed");
            }
        }
    }

    /// Clear the per-conversation counter, returning what the cache held
    /// (`None` on miss or error).
    pub async fn reset_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Option<i64> {
        let key = conversation_key(user_id, conversation_id);
        match self.redis.get_del_i64(&key).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "unread cache reset failed");
                None
            }
        }
    }

    /// `None` on cache miss or cache error; the caller falls back to the
    /// durable counters either way.
    pub async fn cached_total(&self, user_id: Uuid) -> Option<i64> {
        let key = total_key(user_id);
        match self.redis.get_i64(&key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "unread cache read failed");
                None
            }
        }
    }

    pub async fn cached_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Option<i64> {
        let key = conversation_key(user_id, conversation_id);
        match self.redis.get_i64(&key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "unread cache read failed");
                None
            }
        }
    }

    /// Write-behind after a durable fallback read.
    pub async fn backfill_total(&self, user_id: Uuid, value: i64) {
        let key = total_key(user_id);
        if let Err(e) = self.redis.set_i64(&key, value, self.ttl_secs).await {
            tracing::warn!(error = %e, key = %key, "unread cache backfill failed");
        }
    }

    pub async fn backfill_conversation(&self, user_id: Uuid, conversation_id: Uuid, value: i64) {
        let key = conversation_key(user_id, conversation_id);
        if let Err(e) = self.redis.set_i64(&key, value, self.ttl_secs).await {
            tracing::warn!(error = %e, key = %key, "unread cache backfill failed");
        }
    }

    // --- durable tier ---

    /// Sum of the user's unread columns across all their conversations.
    pub fn durable_total(conn: &mut PgConnection, user_id: Uuid) -> AppResult<i64> {
        let as_a: Vec<i64> = conversations::table
            .filter(conversations::user_a.eq(user_id))
            .select(conversations::unread_count_a)
            .load(conn)
            .map_err(|e| AppError::Database(e))?;

        let as_b: Vec<i64> = conversations::table
            .filter(conversations::user_b.eq(user_id))
            .select(conversations::unread_count_b)
            .load(conn)
            .map_err(|e| AppError::Database(e))?;

        Ok(as_a.iter().sum::<i64>() + as_b.iter().sum::<i64>())
    }

    pub fn durable_conversation(
        conn: &mut PgConnection,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<i64> {
        let conversation: crate::models::Conversation = conversations::table
            .find(conversation_id)
            .first(conn)
            .optional()
            .map_err(|e| AppError::Database(e))?
            .ok_or_else(|| {
                AppError::new(ErrorCode::ConversationNotFound, "conversation not found")
            })?;

        Ok(conversation.unread_for(user_id))
    }

    // --- read policy: cache first, durable fallback with backfill ---

    pub async fn total(&self, conn: &mut PgConnection, user_id: Uuid) -> AppResult<i64> {
        if let Some(value) = self.cached_total(user_id).await {
            return Ok(value);
        }
        let value = Self::durable_total(conn, user_id)?;
        self.backfill_total(user_id, value).await;
        Ok(value)
    }

    pub async fn conversation_unread(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<i64> {
        if let Some(value) = self.cached_conversation(user_id, conversation_id).await {
            return Ok(value);
        }
        let value = Self::durable_conversation(conn, user_id, conversation_id)?;
        self.backfill_conversation(user_id, conversation_id, value).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_scoped_per_user_and_conversation() {
        let user = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        assert_eq!(total_key(user), format!("unread:{user}"));
        assert_eq!(
            conversation_key(user, conversation),
            format!("unread:{user}:{conversation}")
        );
        assert_ne!(total_key(user), conversation_key(user, conversation));
    }
}

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self { conn })
    }

    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    pub async fn set_i64(&self, key: &str, value: i64, ttl_secs: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl_secs).await
    }

    pub async fn incr_by(&self, key: &str, by: i64) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.incr(key, by).await
    }

    pub async fn decr_by(&self, key: &str, by: i64) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.decr(key, by).await
    }

    pub async fn get_del_i64(&self, key: &str) -> Result<Option<i64>, redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL").arg(key).query_async(&mut conn).await
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl_secs).await
    }
}

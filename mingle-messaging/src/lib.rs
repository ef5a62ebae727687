use std::sync::Arc;

use mingle_shared::clients::db::{create_pool, DbPool};
use mingle_shared::clients::rabbitmq::RabbitMQClient;
use mingle_shared::clients::redis::RedisClient;

pub mod blocks;
pub mod config;
pub mod counters;
pub mod delivery;
pub mod events;
pub mod models;
pub mod schema;
pub mod services;

use crate::config::AppConfig;
use crate::counters::UnreadCounters;
use crate::delivery::LiveDelivery;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub counters: UnreadCounters,
    pub delivery: Arc<dyn LiveDelivery>,
}

impl AppState {
    pub async fn connect(
        config: AppConfig,
        delivery: Arc<dyn LiveDelivery>,
    ) -> anyhow::Result<Self> {
        let db = create_pool(&config.database_url)?;
        let redis = RedisClient::connect(&config.redis_url).await?;
        let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
        let counters = UnreadCounters::new(redis, config.unread_cache_ttl_secs);

        Ok(Self {
            db,
            config,
            rabbitmq,
            counters,
            delivery,
        })
    }
}

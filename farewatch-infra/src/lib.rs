pub mod app_config;
pub mod database;
pub mod trip_repo;
pub mod rental_repo;
pub mod user_repo;
pub mod redis_repo;
pub mod events;
pub mod sidecar;

pub use app_config::Config;
pub use database::DbClient;
pub use redis_repo::RedisSessionStore;
pub use events::{EventProducer, KafkaAlertSink};
pub use sidecar::SidecarLauncher;

//! Redis storage layer for users, purchases, challenges and revoked sessions.
//!
//! All functions are async and generic over `redis::AsyncCommands`.
//! Records are serialized to JSON. Every multi-key write goes through a Lua
//! script so that it is atomic with respect to other clients, including other
//! server processes sharing the same Redis.

pub mod purchase;
pub mod session;
pub mod user;

use serde::{de::DeserializeOwned, Serialize};

/// Serialize a record for storage, reporting failures as Redis errors.
fn to_json<T: Serialize>(value: &T) -> Result<String, redis::RedisError> {
    serde_json::to_string(value).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "JSON serialize",
            e.to_string(),
        ))
    })
}

/// Deserialize a stored record, reporting failures as Redis errors.
fn from_json<T: DeserializeOwned>(data: &str) -> Result<T, redis::RedisError> {
    serde_json::from_str(data).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "JSON deserialize",
            e.to_string(),
        ))
    })
}

/// Connect to the test Redis instance, or `None` when it is unreachable.
#[cfg(test)]
pub(crate) async fn test_connection() -> Option<redis::aio::MultiplexedConnection> {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = match redis::Client::open(redis_url) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("Skipping test: Redis not available");
            return None;
        }
    };

    match client.get_multiplexed_async_connection().await {
        Ok(con) => Some(con),
        Err(_) => {
            eprintln!("Skipping test: Redis connection failed");
            None
        }
    }
}

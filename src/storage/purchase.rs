//! Purchase ledger Redis operations.
//!
//! Redis key patterns:
//! - `purchase:{user_id}:{course_id}` — purchase record (JSON)
//! - `user_purchases:{user_id}` — ZSET of course ids scored by purchase time (ms)
//! - `purchase_tx:{tx_hash}` — `{user_id}:{course_id}` that consumed the transaction
//!
//! Records are immutable: nothing in this module overwrites or deletes them.

use crate::models::StoredPurchase;
use chrono::Utc;
use redis::AsyncCommands;

/// Outcome of [`record_purchase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(StoredPurchase),
    /// The user already owns this course.
    AlreadyPurchased,
    /// The transaction was already used for another purchase.
    TransactionReused,
}

/// Check whether a user has purchased a course.
pub async fn has_purchase<C>(
    con: &mut C,
    user_id: &str,
    course_id: &str,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = format!("purchase:{}:{}", user_id, course_id);
    con.exists(&key).await
}

/// Record a purchase atomically.
///
/// A single Lua script checks the (user, course) key and the transaction
/// index and performs all three writes, so concurrent identical requests
/// yield exactly one `Recorded` and the rest `AlreadyPurchased`. A script
/// either runs to completion or not at all; no partial record is visible.
pub async fn record_purchase<C>(
    con: &mut C,
    user_id: &str,
    course_id: &str,
    tx_hash: &str,
    amount: &str,
) -> Result<RecordOutcome, redis::RedisError>
where
    C: AsyncCommands,
{
    let purchase = StoredPurchase {
        id: nanoid::nanoid!(16),
        user_id: user_id.to_string(),
        course_id: course_id.to_string(),
        tx_hash: tx_hash.to_string(),
        amount: amount.to_string(),
        created_at: Utc::now(),
    };

    let purchase_key = format!("purchase:{}:{}", user_id, course_id);
    let user_purchases_key = format!("user_purchases:{}", user_id);
    let tx_key = format!("purchase_tx:{}", tx_hash);
    let json = super::to_json(&purchase)?;

    // 0 = recorded, 1 = pair exists, 2 = transaction already used
    let script = redis::Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            return 1
        end
        if not redis.call('SET', KEYS[3], ARGV[4], 'NX') then
            return 2
        end
        redis.call('SET', KEYS[1], ARGV[1])
        redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
        return 0
        ",
    );

    let status: i32 = script
        .key(&purchase_key)
        .key(&user_purchases_key)
        .key(&tx_key)
        .arg(&json)
        .arg(purchase.created_at.timestamp_millis())
        .arg(course_id)
        .arg(format!("{}:{}", user_id, course_id))
        .invoke_async(con)
        .await?;

    match status {
        0 => Ok(RecordOutcome::Recorded(purchase)),
        1 => Ok(RecordOutcome::AlreadyPurchased),
        2 => Ok(RecordOutcome::TransactionReused),
        other => Err(redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "record_purchase script",
            format!("unexpected status {}", other),
        ))),
    }
}

/// Get a single purchase.
pub async fn get_purchase<C>(
    con: &mut C,
    user_id: &str,
    course_id: &str,
) -> Result<Option<StoredPurchase>, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = format!("purchase:{}:{}", user_id, course_id);
    let json: Option<String> = con.get(&key).await?;

    match json {
        Some(data) => Ok(Some(super::from_json(&data)?)),
        None => Ok(None),
    }
}

/// List all purchases of a user, newest first.
pub async fn list_purchases<C>(
    con: &mut C,
    user_id: &str,
) -> Result<Vec<StoredPurchase>, redis::RedisError>
where
    C: AsyncCommands,
{
    let user_purchases_key = format!("user_purchases:{}", user_id);
    let course_ids: Vec<String> = con.zrevrange(&user_purchases_key, 0, -1).await?;

    let mut purchases = Vec::with_capacity(course_ids.len());
    for course_id in course_ids {
        match get_purchase(con, user_id, &course_id).await? {
            Some(purchase) => purchases.push(purchase),
            None => {
                tracing::warn!(user_id = %user_id, course_id = %course_id, "Purchase index entry without record");
            }
        }
    }

    Ok(purchases)
}

//! Course access decisions.
//!
//! Access is owned iff the purchase ledger holds a record for the (user,
//! course) pair. The ledger is read on every call; there is no cache, so a
//! decision is never stale after a purchase is recorded.

use crate::storage;
use redis::AsyncCommands;

/// Whether `user_id` may open `course_id`.
pub async fn has_access<C>(
    con: &mut C,
    user_id: &str,
    course_id: &str,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    storage::purchase::has_purchase(con, user_id, course_id).await
}

//! User directory Redis operations.
//!
//! Redis key patterns:
//! - `user:{id}` — user data (JSON)
//! - `wallet:{address}` — canonical wallet address to user id (STRING)
//!
//! The `wallet:` key is the uniqueness constraint: it is only ever written with
//! `SET NX`, so one address maps to at most one user no matter how many logins
//! race.

use crate::models::StoredUser;
use chrono::Utc;
use redis::AsyncCommands;

/// Length of generated user ids.
const USER_ID_LEN: usize = 16;

/// Result of [`find_or_create_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub user: StoredUser,
    /// True when this call created the user
    pub created: bool,
}

/// Look up the user for a canonical wallet address, creating it if absent.
///
/// Runs as a single Lua script: claim `wallet:{address}` with `SET NX`, and
/// either write the new user record or return the one that already owns the
/// address. Concurrent first logins therefore resolve to the same user.
///
/// Returns `Ok(None)` only if the address is claimed but its user record is
/// missing, which indicates external tampering with the store.
pub async fn find_or_create_user<C>(
    con: &mut C,
    wallet_address: &str,
) -> Result<Option<ResolvedUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let candidate = StoredUser {
        id: nanoid::nanoid!(USER_ID_LEN),
        wallet_address: wallet_address.to_string(),
        created_at: Utc::now(),
    };

    let wallet_key = format!("wallet:{}", wallet_address);
    let user_key = format!("user:{}", candidate.id);
    let json = super::to_json(&candidate)?;

    let script = redis::Script::new(
        r"
        if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
            redis.call('SET', KEYS[2], ARGV[2])
            return ARGV[2]
        end
        local existing = redis.call('GET', KEYS[1])
        return redis.call('GET', ARGV[3] .. existing)
        ",
    );

    let stored: Option<String> = script
        .key(&wallet_key)
        .key(&user_key)
        .arg(&candidate.id)
        .arg(&json)
        .arg("user:")
        .invoke_async(con)
        .await?;

    match stored {
        Some(data) => {
            let user: StoredUser = super::from_json(&data)?;
            let created = user.id == candidate.id;
            Ok(Some(ResolvedUser { user, created }))
        }
        None => Ok(None),
    }
}

/// Get a user by ID.
pub async fn get_user<C>(con: &mut C, id: &str) -> Result<Option<StoredUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = format!("user:{}", id);
    let json: Option<String> = con.get(&key).await?;

    match json {
        Some(data) => Ok(Some(super::from_json(&data)?)),
        None => Ok(None),
    }
}

/// Get a user by canonical wallet address.
///
/// Performs a two-step lookup: address -> user_id -> user data.
pub async fn get_user_by_wallet<C>(
    con: &mut C,
    wallet_address: &str,
) -> Result<Option<StoredUser>, redis::RedisError>
where
    C: AsyncCommands,
{
    let wallet_key = format!("wallet:{}", wallet_address);
    let user_id: Option<String> = con.get(&wallet_key).await?;

    match user_id {
        Some(id) => get_user(con, &id).await,
        None => Ok(None),
    }
}

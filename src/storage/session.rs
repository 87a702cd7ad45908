//! Login challenge and session revocation Redis operations.
//!
//! Redis key patterns:
//! - `challenge:{nonce}` — pending login challenge (JSON, TTL)
//! - `revoked_session:{jti}` — denylisted session id (TTL = remaining token lifetime)
//!
//! Sessions themselves are stateless signed tokens; Redis only holds what a
//! token cannot carry: single-use challenges and early revocations.
//!
//! ## Zeroizing challenge data
//!
//! Challenge nonces read back from Redis are wrapped in `Zeroizing` so the
//! application's copy is cleared once parsed. Redis keeps its own copy until
//! the key is deleted.

use crate::models::StoredChallenge;
use redis::AsyncCommands;
use zeroize::Zeroizing;

/// Store a login challenge under its nonce.
///
/// An address may hold any number of pending challenges; each one lives
/// until it is taken or its TTL runs out.
pub async fn store_challenge<C>(
    con: &mut C,
    challenge: &StoredChallenge,
    ttl_secs: u64,
) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let key = format!("challenge:{}", challenge.nonce);
    let json = super::to_json(challenge)?;

    con.set_ex::<_, _, ()>(&key, json, ttl_secs).await?;
    Ok(())
}

/// Get and delete a challenge atomically (single-use nonce).
///
/// A challenge is consumed by the first login attempt that presents its
/// nonce, whether or not the signature turns out valid.
pub async fn take_challenge<C>(
    con: &mut C,
    nonce: &str,
) -> Result<Option<StoredChallenge>, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = format!("challenge:{}", nonce);

    // Lua script for atomic GET + DEL
    let script = redis::Script::new(
        r"
        local val = redis.call('GET', KEYS[1])
        if val then
            redis.call('DEL', KEYS[1])
        end
        return val
        ",
    );

    let json: Option<String> = script.key(&key).invoke_async(con).await?;

    match json {
        Some(data) => {
            let data = Zeroizing::new(data);
            Ok(Some(super::from_json(&data)?))
        }
        None => Ok(None),
    }
}

/// Denylist a session id until its token would have expired anyway.
///
/// A zero remaining lifetime is a no-op: the token is already unusable.
pub async fn revoke_session<C>(
    con: &mut C,
    token_id: &str,
    remaining_secs: u64,
) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    if remaining_secs == 0 {
        return Ok(());
    }

    let key = format!("revoked_session:{}", token_id);
    con.set_ex::<_, _, ()>(&key, 1, remaining_secs).await?;
    Ok(())
}

/// Check whether a session id has been revoked.
pub async fn is_session_revoked<C>(con: &mut C, token_id: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let key = format!("revoked_session:{}", token_id);
    con.exists(&key).await
}

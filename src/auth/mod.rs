//! Wallet authentication: EIP-191 signature recovery, JWT sessions and the
//! session gate in front of every user-scoped endpoint.

pub mod cookie;
pub mod middleware;
pub mod session;
pub mod verify;

pub use middleware::{check_rate_limit, AppState, AuthSession};
pub use session::{generate_challenge_nonce, Claims, SessionManager};
pub use verify::verify_wallet_signature;

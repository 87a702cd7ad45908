use axum::http::HeaderValue;
use rust_decimal::Decimal;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Polygon PoS native USDC.
pub const DEFAULT_PAYMENT_TOKEN_ADDRESS: &str = "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359";
pub const DEFAULT_TREASURY_ADDRESS: &str = "0x38ee17cc296b2e947d54e918404645d4ef2a5dad";

/// Minimum accepted length of `JWT_SECRET` in bytes.
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct Config {
    // Session signing
    pub jwt_secret: String,

    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,
    pub frontend_url: String,

    // TTLs (in seconds)
    pub session_ttl_secs: u64,
    pub challenge_ttl_secs: u64,

    // Login / session policy
    pub require_login_challenge: bool,
    pub revoke_on_logout: bool,
    pub cookie_secure: bool,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,
    pub rate_limit_api_per_min: u32,

    // Pricing
    pub course_price: Decimal,

    // On-chain payment verification (disabled when None)
    pub payment: Option<PaymentConfig>,
}

/// Settings for verifying course payments against the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    pub rpc_url: String,
    /// Lower-cased ERC-20 contract address.
    pub token_address: String,
    /// Lower-cased recipient address.
    pub treasury_address: String,
    pub token_decimals: u32,
    pub min_confirmations: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("frontend_url", &self.frontend_url)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("challenge_ttl_secs", &self.challenge_ttl_secs)
            .field("require_login_challenge", &self.require_login_challenge)
            .field("revoke_on_logout", &self.revoke_on_logout)
            .field("cookie_secure", &self.cookie_secure)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .field("rate_limit_api_per_min", &self.rate_limit_api_per_min)
            .field("course_price", &self.course_price)
            .field(
                "payment",
                &self.payment.as_ref().map(|p| {
                    (
                        "[REDACTED rpc_url]",
                        &p.token_address,
                        &p.treasury_address,
                        p.token_decimals,
                        p.min_confirmations,
                    )
                }),
            )
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} bytes", MIN_JWT_SECRET_LEN),
            ));
        }

        // Redis — required to prevent silent unauthenticated connections
        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        // Must be usable verbatim as an Access-Control-Allow-Origin value
        if frontend_url.is_empty() || HeaderValue::from_str(&frontend_url).is_err() {
            return Err(ConfigError::InvalidValue(
                "FRONTEND_URL".to_string(),
                "must be a non-empty origin".to_string(),
            ));
        }

        // TTLs
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 604_800)?;
        let challenge_ttl_secs = parse_env_or_default("CHALLENGE_TTL_SECS", 300)?;
        if session_ttl_secs == 0 || challenge_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_SECS/CHALLENGE_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // Login / session policy
        let require_login_challenge = parse_env_or_default("REQUIRE_LOGIN_CHALLENGE", true)?;
        let revoke_on_logout = parse_env_or_default("REVOKE_ON_LOGOUT", false)?;
        let cookie_secure = parse_env_or_default("COOKIE_SECURE", true)?;

        // Rate limiting
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 10)?;
        let rate_limit_api_per_min = parse_env_or_default("RATE_LIMIT_API_PER_MIN", 100)?;

        // Pricing
        let course_price: Decimal = parse_env_or_default("COURSE_PRICE", Decimal::from(2))?;
        if course_price <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue(
                "COURSE_PRICE".to_string(),
                "must be positive".to_string(),
            ));
        }

        let payment = load_payment_config()?;

        Ok(Config {
            jwt_secret,
            redis_url,
            bind_addr,
            frontend_url,
            session_ttl_secs,
            challenge_ttl_secs,
            require_login_challenge,
            revoke_on_logout,
            cookie_secure,
            rate_limit_auth_per_min,
            rate_limit_api_per_min,
            course_price,
            payment,
        })
    }
}

/// Payment verification is switched on by setting `CHAIN_RPC_URL`.
fn load_payment_config() -> Result<Option<PaymentConfig>, ConfigError> {
    let rpc_url = match env::var("CHAIN_RPC_URL") {
        Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => return Ok(None),
    };

    let token_address = parse_address_var("PAYMENT_TOKEN_ADDRESS", DEFAULT_PAYMENT_TOKEN_ADDRESS)?;
    let treasury_address = parse_address_var("TREASURY_ADDRESS", DEFAULT_TREASURY_ADDRESS)?;

    let token_decimals: u32 = parse_env_or_default("PAYMENT_TOKEN_DECIMALS", 6)?;
    if token_decimals > 18 {
        return Err(ConfigError::InvalidValue(
            "PAYMENT_TOKEN_DECIMALS".to_string(),
            "must be at most 18".to_string(),
        ));
    }
    let min_confirmations = parse_env_or_default("PAYMENT_MIN_CONFIRMATIONS", 5)?;

    Ok(Some(PaymentConfig {
        rpc_url,
        token_address,
        treasury_address,
        token_decimals,
        min_confirmations,
    }))
}

fn parse_address_var(key: &str, default: &str) -> Result<String, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    crate::auth::verify::canonical_address(&raw)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), "not a valid address".to_string()))
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests run serially since they modify global env vars.
    // unwrap_or_else handles poison from prior panics.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn lock_test() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn clear_test_env() {
        for key in [
            "JWT_SECRET",
            "REDIS_URL",
            "BIND_ADDR",
            "FRONTEND_URL",
            "SESSION_TTL_SECS",
            "CHALLENGE_TTL_SECS",
            "REQUIRE_LOGIN_CHALLENGE",
            "REVOKE_ON_LOGOUT",
            "COOKIE_SECURE",
            "RATE_LIMIT_AUTH_PER_MIN",
            "RATE_LIMIT_API_PER_MIN",
            "COURSE_PRICE",
            "CHAIN_RPC_URL",
            "PAYMENT_TOKEN_ADDRESS",
            "TREASURY_ADDRESS",
            "PAYMENT_TOKEN_DECIMALS",
            "PAYMENT_MIN_CONFIRMATIONS",
        ] {
            env::remove_var(key);
        }
    }

    /// Set the required vars. Every optional var that a local .env could
    /// supply is pinned explicitly so dotenvy cannot change the outcome.
    fn set_required() {
        env::set_var("JWT_SECRET", TEST_SECRET);
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");
        env::set_var("CHAIN_RPC_URL", "");
    }

    #[test]
    fn test_parse_env_or_default() {
        let _guard = lock_test();

        env::set_var("TEST_U64", "12345");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 12345);

        env::remove_var("TEST_U64");
        let result: Result<u64, ConfigError> = parse_env_or_default("TEST_U64", 100);
        assert_eq!(result.unwrap(), 100);

        env::set_var("TEST_BOOL", "false");
        let result: Result<bool, ConfigError> = parse_env_or_default("TEST_BOOL", true);
        assert!(!result.unwrap());
        env::remove_var("TEST_BOOL");
    }

    #[test]
    fn test_config_defaults() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("BIND_ADDR", "0.0.0.0:3001");

        let config = Config::from_env().unwrap();

        assert_eq!(config.jwt_secret, TEST_SECRET);
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3001");
        assert_eq!(config.session_ttl_secs, 604_800);
        assert_eq!(config.challenge_ttl_secs, 300);
        assert!(config.require_login_challenge);
        assert!(!config.revoke_on_logout);
        assert_eq!(config.rate_limit_auth_per_min, 10);
        assert_eq!(config.rate_limit_api_per_min, 100);
        assert_eq!(config.course_price, Decimal::from(2));
        assert!(config.payment.is_none());

        clear_test_env();
    }

    #[test]
    fn test_missing_jwt_secret() {
        let _guard = lock_test();
        clear_test_env();
        // An empty value keeps dotenvy from filling the var from .env and
        // fails the length check instead.
        env::set_var("JWT_SECRET", "");
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "JWT_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_short_jwt_secret() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("JWT_SECRET", "your-secret-key");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "JWT_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_socket_addr() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("BIND_ADDR", "invalid_address");

        let result = Config::from_env();
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_, _)));

        clear_test_env();
    }

    #[test]
    fn test_invalid_course_price() {
        let _guard = lock_test();
        clear_test_env();
        set_required();

        env::set_var("COURSE_PRICE", "0");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "COURSE_PRICE"
        ));

        env::set_var("COURSE_PRICE", "two");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::ParseError(ref s, _) if s == "COURSE_PRICE"
        ));

        clear_test_env();
    }

    #[test]
    fn test_payment_config_defaults() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("CHAIN_RPC_URL", "https://polygon-rpc.example");

        let config = Config::from_env().unwrap();
        let payment = config.payment.expect("payment verification enabled");
        assert_eq!(payment.rpc_url, "https://polygon-rpc.example");
        assert_eq!(payment.token_address, DEFAULT_PAYMENT_TOKEN_ADDRESS);
        assert_eq!(payment.treasury_address, DEFAULT_TREASURY_ADDRESS);
        assert_eq!(payment.token_decimals, 6);
        assert_eq!(payment.min_confirmations, 5);

        clear_test_env();
    }

    #[test]
    fn test_payment_addresses_are_canonicalized() {
        let _guard = lock_test();
        clear_test_env();
        set_required();
        env::set_var("CHAIN_RPC_URL", "https://polygon-rpc.example");
        env::set_var(
            "TREASURY_ADDRESS",
            "0x38EE17CC296B2E947D54E918404645D4EF2A5DAD",
        );

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.payment.unwrap().treasury_address,
            DEFAULT_TREASURY_ADDRESS
        );

        env::set_var("TREASURY_ADDRESS", "0x1234");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "TREASURY_ADDRESS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let _guard = lock_test();
        clear_test_env();
        set_required();

        let config = Config::from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(TEST_SECRET));
        assert!(!debug.contains("redis://"));

        clear_test_env();
    }
}

//! Coursegate application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Set up the session manager and (optionally) on-chain payment verification
//! 4. Build router with API routes, rate limiting, CORS and security headers
//! 5. Start Axum server
//!
//! Also supports a `sign-login` subcommand for producing wallet login
//! signatures by hand during development.

use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use axum::http::{header, HeaderValue, Method};
use coursegate::{
    auth::{middleware::AppState, session::LOGIN_MESSAGE, SessionManager},
    config::Config,
    middleware::security_headers,
    payment::{RpcTransferVerifier, TransferVerifier},
    routes,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Sign `message` as a wallet would for `personal_sign`.
///
/// Returns `(address, signature)` with a `0x`-prefixed 65-byte signature.
fn sign_login(private_key: &str, message: &str) -> Result<(String, String), String> {
    let signer = PrivateKeySigner::from_str(private_key.trim())
        .map_err(|e| format!("Invalid private key: {}", e))?;
    let signature = signer
        .sign_message_sync(message.as_bytes())
        .map_err(|e| format!("Signing failed: {}", e))?;

    Ok((
        format!("0x{}", hex::encode(signer.address().as_slice())),
        format!("0x{}", hex::encode(signature.as_bytes())),
    ))
}

fn print_sign_login_usage() {
    eprintln!("Usage: coursegate sign-login <private-key-hex> [message]");
    eprintln!();
    eprintln!("Sign a login message with a wallet key (EIP-191 personal_sign).");
    eprintln!("Without a message, signs the legacy fixed login message.");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  coursegate sign-login 0xac09...ff80 \"$(jq -r .message challenge.json)\"");
}

#[tokio::main]
async fn main() {
    // Check for sign-login subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "sign-login" {
        if args.len() != 3 && args.len() != 4 {
            print_sign_login_usage();
            std::process::exit(1);
        }
        let message = args.get(3).map(String::as_str).unwrap_or(LOGIN_MESSAGE);

        match sign_login(&args[2], message) {
            Ok((address, signature)) => {
                println!("address:   {}", address);
                println!("signature: {}", signature);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting coursegate on {}", config.bind_addr);

    // Connect to Redis
    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    // Verify Redis connection
    redis_client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");

    let sessions = SessionManager::new(config.jwt_secret.as_bytes(), config.session_ttl_secs);

    let payments: Option<Arc<dyn TransferVerifier>> = match &config.payment {
        Some(payment) => {
            tracing::info!(
                token = %payment.token_address,
                treasury = %payment.treasury_address,
                min_confirmations = payment.min_confirmations,
                "On-chain payment verification enabled"
            );
            let verifier: Arc<dyn TransferVerifier> = Arc::new(
                RpcTransferVerifier::new(payment.clone())
                    .expect("Failed to create payment verifier"),
            );
            Some(verifier)
        }
        None => {
            tracing::warn!(
                "CHAIN_RPC_URL not set: purchases are recorded WITHOUT on-chain payment verification"
            );
            None
        }
    };

    if !config.require_login_challenge {
        tracing::warn!("REQUIRE_LOGIN_CHALLENGE=false: the fixed login message is accepted and can be replayed");
    }

    // Build shared state
    let state = AppState {
        redis: redis_client,
        config: Arc::new(config.clone()),
        sessions: Arc::new(sessions),
        payments,
    };

    // Only the frontend may call the API from a browser, with its cookie
    let frontend_origin =
        HeaderValue::from_str(&config.frontend_url).expect("FRONTEND_URL validated by config");
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let app = routes::api_router(state.clone())
        .layer(axum::extract::DefaultBodyLimit::max(16 * 1024))
        .layer(cors)
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

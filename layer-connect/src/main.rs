//! Demo binary: connect to an MTProto server, complete the auth-key
//! handshake, and keep the session alive through the dispatcher.
//!
//! # What this does
//!
//! 1. TCP connect to the configured address
//! 2. Run the 4-step sans-IO handshake (`req_pq_multi` → `req_DH_params` →
//!    `set_client_DH_params` → derive `auth_key`)
//! 3. Hand the resulting session to [`layer_mtproto::Dispatcher`], which
//!    starts the reader and keepalive-ping tasks
//! 4. Send one `ping_delay_disconnect` through it and print the `pong`
//!
//! This crate carries no RSA key material or DC address table of its own —
//! both are external collaborators ([`PublicKeys`], [`DcList`]) a real
//! caller supplies from whatever source it trusts. `main` below builds
//! them from environment variables so the binary stays runnable without
//! editing source.
//!
//! # Run
//! ```text
//! LAYER_SERVER_ADDR=149.154.167.40:80 \
//! LAYER_RSA_N=... LAYER_RSA_E=... LAYER_RSA_FINGERPRINT=... \
//! cargo run -p layer-connect
//! ```

use layer_crypto::rsa;
use layer_mtproto::{Dispatcher, StaticDcList};
use layer_mtproto::authentication::StaticKeyRing;
use layer_mtproto::dispatcher::Config;
use layer_tl_types::functions::PingDelayDisconnect;

const DEFAULT_ADDR: &str = "149.154.167.40:80"; // DC1, test environment

fn public_keys_from_env() -> StaticKeyRing {
    let (n, e, fp) = (
        std::env::var("LAYER_RSA_N"),
        std::env::var("LAYER_RSA_E"),
        std::env::var("LAYER_RSA_FINGERPRINT"),
    );
    match (n, e, fp) {
        (Ok(n), Ok(e), Ok(fp)) => match (rsa::Key::new(&n, &e), fp.parse::<i64>()) {
            (Some(key), Ok(fingerprint)) => StaticKeyRing::new(vec![(fingerprint, key)]),
            _ => {
                log::warn!("LAYER_RSA_{{N,E,FINGERPRINT}} set but unparseable; ignoring");
                StaticKeyRing::default()
            }
        },
        _ => {
            log::warn!(
                "no LAYER_RSA_{{N,E,FINGERPRINT}} set; the handshake will fail with \
                 UnknownFingerprints until real server key material is supplied"
            );
            StaticKeyRing::default()
        }
    }
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info") };
    }
    env_logger::init();

    let server_addr = std::env::var("LAYER_SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    log::info!("connecting to {server_addr}");

    let config = Config {
        server_addr,
        dc_list: std::sync::Arc::new(StaticDcList::default()),
        public_keys: std::sync::Arc::new(public_keys_from_env()),
        warn_channel_capacity: 64,
        update_handlers: Vec::new(),
    };

    let (dispatcher, mut warnings) = match Dispatcher::connect(config).await {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("handshake failed: {e}");
            std::process::exit(1);
        }
    };
    log::info!("handshake complete, session running");

    tokio::spawn(async move {
        while let Some(w) = warnings.recv().await {
            log::warn!("{w}");
        }
    });

    let mut ping_id_bytes = [0u8; 8];
    getrandom::getrandom(&mut ping_id_bytes).expect("getrandom");
    let ping = PingDelayDisconnect {
        ping_id: i64::from_le_bytes(ping_id_bytes),
        disconnect_delay: 75,
    };

    match dispatcher.invoke(&ping).await {
        Ok(pong) => log::info!("pong received: msg_id={} ping_id={}", pong.msg_id, pong.ping_id),
        Err(e) => log::error!("ping failed: {e}"),
    }

    dispatcher.close().await;
}

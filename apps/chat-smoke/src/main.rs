mod logging;

use std::{env, fs, process::ExitCode};

use chat_core::{ChatState, ThreadSnapshot};
use chat_http::{ClientConfig, RequestError, ResilientRequestClient, WalletAuth};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = env::var("CHAT_THREAD_SNAPSHOT")
        .ok()
        .filter(|path| !path.trim().is_empty())
        && !load_snapshot(&path)
    {
        return ExitCode::FAILURE;
    }

    let client = match ResilientRequestClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build http client");
            return ExitCode::FAILURE;
        }
    };
    info!(base_url = %client.base_url(), user_agent = %client.user_agent(), "request client ready");

    let Some(address) = env::var("CHAT_WALLET_ADDRESS")
        .ok()
        .filter(|address| !address.trim().is_empty())
    else {
        info!("CHAT_WALLET_ADDRESS not set; skipping live wallet handshake");
        return ExitCode::SUCCESS;
    };

    let auth = WalletAuth::new(client, address);
    match run_handshake(&auth).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(
                category = ?err.category(),
                code = ?err.code(),
                status = ?err.status(),
                error = %err,
                "wallet handshake failed"
            );
            ExitCode::FAILURE
        }
    }
}

fn load_snapshot(path: &str) -> bool {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            error!(path, error = %err, "failed to read thread snapshot");
            return false;
        }
    };
    let snapshot: ThreadSnapshot = match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            error!(path, error = %err, "failed to parse thread snapshot");
            return false;
        }
    };

    let mut state = ChatState::new();
    let thread = state.ingest_thread(snapshot);
    info!(
        thread_id = thread.id(),
        channel = %thread.channel().cid(),
        replies = thread.replies().len(),
        participants = thread.participants().len(),
        reply_count = thread.reply_count(),
        read_states = thread.read_states().count(),
        "thread snapshot loaded"
    );
    info!(users = state.directory().len(), "user directory populated");
    true
}

async fn run_handshake(auth: &WalletAuth) -> Result<(), RequestError> {
    let challenge = auth.start_auth().await?;
    match challenge.nonce.as_deref() {
        Some(nonce) => info!(address = auth.address(), nonce, "auth challenge issued"),
        None => warn!(address = auth.address(), "auth challenge carried no nonce"),
    }

    let grant = auth.get_token(None).await?;
    info!(
        address = auth.address(),
        has_refresh_token = grant.refresh_token.is_some(),
        "session token issued"
    );
    Ok(())
}

use async_trait::async_trait;
use easy_access::crypto::StoredKeyStore;
use easy_access::flow::{
    Authorizer, CallbackUris, HandoffMode, Launcher, RedirectInterceptor, Signer,
};
use easy_access::http::HttpClientBuilder;
use easy_access::storage::{FileSecureStorage, MemorySecureStorage, SecureStorage};
use log::{error, info, warn};
use service::{
    config::{Command, Config},
    logging::Logger,
};
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Prints handoff URIs for the user to open on a device with the companion app.
struct TerminalLauncher;

#[async_trait]
impl Launcher for TerminalLauncher {
    async fn open_uri(&self, uri: &str) -> bool {
        println!("Open this link on a device with the Easy Access app:\n\n  {uri}\n");
        true
    }

    async fn present_qr(&self, payload: &str) {
        println!("Encode this payload as a QR code and scan it with the Easy Access app:\n\n  {payload}\n");
    }
}

fn handoff_mode(qr: bool) -> HandoffMode {
    if qr {
        HandoffMode::QrCode
    } else {
        HandoffMode::AppSwitch
    }
}

fn open_storage(config: &Config) -> Result<Arc<dyn SecureStorage>, BoxError> {
    match config.storage_key() {
        Some(key) => Ok(Arc::new(FileSecureStorage::new(&config.storage_dir, key)?)),
        None => {
            warn!("No storage key configured, registration will not outlive this process");
            Ok(Arc::new(MemorySecureStorage::new()))
        }
    }
}

async fn run(config: Config) -> Result<(), BoxError> {
    let easy_access = config.easy_access_config();
    let http = HttpClientBuilder::from_config(easy_access.http.clone()).build()?;
    let storage = open_storage(&config)?;
    let key_store = Arc::new(StoredKeyStore::new(storage.clone()));
    let launcher: Arc<dyn Launcher> = Arc::new(TerminalLauncher);

    match &config.command {
        Command::Status => {
            let authorizer =
                Authorizer::new(easy_access, http, storage, key_store, launcher);
            if authorizer.is_registered().await? {
                println!("Registered as client {}", authorizer.client_id().await?);
            } else {
                println!("Not registered");
            }
        }
        Command::Register {
            client_token,
            device_id,
        } => {
            let authorizer =
                Authorizer::new(easy_access, http, storage, key_store, launcher);
            let client_id = authorizer
                .register(
                    &config.auth_server_url,
                    client_token,
                    device_id,
                    config.redirect_uris(),
                )
                .await?;
            println!("Registered as client {client_id}");
        }
        Command::Authorize {
            qr,
            verify_endpoint,
        } => {
            let authorizer =
                Authorizer::new(easy_access, http, storage, key_store, launcher);
            let (interceptor, mut redirects) =
                RedirectInterceptor::new(&[config.oauth_redirect_uri.as_str()])?;
            let callbacks = CallbackUris::new(
                config.oauth_redirect_uri.clone(),
                config.companion_callback_uri.clone(),
            );

            let session = authorizer
                .authorize(&config.auth_server_url, callbacks, handoff_mode(*qr))
                .await?;
            info!("Login code {} issued", session.login_code);

            if let Some(endpoint) = verify_endpoint {
                authorizer.verify(&session.session_id, endpoint).await?;
            }

            println!("Paste the address the browser was redirected to:");
            let mut lines = BufReader::new(stdin()).lines();
            let event = loop {
                let Some(line) = lines.next_line().await? else {
                    authorizer.cancel().await;
                    return Err("input closed before a redirect was received".into());
                };
                if interceptor.intercept_str(line.trim()).is_some() {
                    if let Some(event) = redirects.recv().await {
                        break event;
                    }
                }
                println!("Not an authorization response for {}", config.oauth_redirect_uri);
            };

            let tokens = authorizer
                .handle_auth_code_callback(&event, &session)
                .await?;
            println!(
                "Signed in: {} token for scope '{}', expires in {}s\n{}",
                tokens.token_type,
                tokens.scope,
                tokens.expires_in,
                tokens.access_token()
            );
        }
        Command::Sign {
            signature_endpoint,
            data,
            callback,
            qr,
        } => {
            let signer = Signer::new(http, launcher, easy_access.companion_app());
            let session = signer
                .request_signature(
                    signature_endpoint,
                    data,
                    callback,
                    handoff_mode(*qr),
                )
                .await?;
            println!("Signature requested with code {}", session.signature_code);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

use clap::builder::TypedValueParser as _;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use easy_access::config::{
    DEFAULT_CLIENT_ID_KEY, DEFAULT_COMPANION_SCHEME, DEFAULT_PRIVATE_KEY_TAG,
    DEFAULT_PUBLIC_KEY_TAG,
};
use easy_access::crypto::KeyTags;
use easy_access::http::HttpClientConfig;
use easy_access::EasyAccessConfig;
use log::LevelFilter;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base address of the Easy Access authorization server
    #[arg(long, env, default_value = "http://localhost:8080")]
    pub auth_server_url: String,

    /// Callback the authorization server redirects to with the authorization code
    #[arg(long, env, default_value = "easyaccess-cli:/oauth-callback")]
    pub oauth_redirect_uri: String,

    /// Callback the companion app returns to after the user approves
    #[arg(long, env, default_value = "easyaccess-cli:/easyaccess")]
    pub companion_callback_uri: String,

    /// URI scheme registered by the companion app
    #[arg(long, env, default_value = DEFAULT_COMPANION_SCHEME)]
    pub companion_scheme: String,

    /// Environment tag forwarded to the companion app
    #[arg(long, env)]
    pub auth_env: Option<String>,

    /// Directory holding the encrypted client id and key pair
    #[arg(long, env, default_value = ".easy-access")]
    pub storage_dir: PathBuf,

    /// 32 byte hex key used to encrypt stored values. Without it nothing is persisted.
    #[arg(long, env, hide_env_values = true)]
    storage_key: Option<String>,

    /// Secure storage key holding the registered client id
    #[arg(long, env, default_value = DEFAULT_CLIENT_ID_KEY)]
    pub client_id_key: String,

    /// Key store tag of the private half of the installation key pair
    #[arg(long, env, default_value = DEFAULT_PRIVATE_KEY_TAG)]
    pub private_key_tag: String,

    /// Key store tag of the public half of the installation key pair
    #[arg(long, env, default_value = DEFAULT_PUBLIC_KEY_TAG)]
    pub public_key_tag: String,

    /// Total timeout in seconds for each HTTP request
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Timeout in seconds for establishing HTTP connections
    #[arg(long, env, default_value_t = 10)]
    pub http_connect_timeout_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Register this installation with the authorization server
    Register {
        /// One-time client token issued by the app backend
        #[arg(long, env)]
        client_token: String,

        /// Identifier of this device
        #[arg(long, env)]
        device_id: String,
    },
    /// Sign in through the companion app
    Authorize {
        /// Show the handoff as a QR code instead of opening the app
        #[arg(long)]
        qr: bool,

        /// Confirm the login session at this endpoint before waiting for the redirect
        #[arg(long)]
        verify_endpoint: Option<String>,
    },
    /// Ask the companion app to sign data
    Sign {
        /// Endpoint that accepts the data and returns a signature code
        #[arg(long, env)]
        signature_endpoint: String,

        /// Data to sign
        #[arg(long)]
        data: String,

        /// Callback the companion app returns to after signing
        #[arg(long, default_value = "easyaccess-cli:/signature")]
        callback: String,

        /// Show the handoff as a QR code instead of opening the app
        #[arg(long)]
        qr: bool,
    },
    /// Report whether this installation is registered
    Status,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn storage_key(&self) -> Option<SecretString> {
        self.storage_key.clone().map(SecretString::from)
    }

    pub fn redirect_uris(&self) -> Vec<String> {
        vec![self.oauth_redirect_uri.clone()]
    }

    /// Library configuration derived from the command line and environment.
    pub fn easy_access_config(&self) -> EasyAccessConfig {
        EasyAccessConfig {
            companion_scheme: self.companion_scheme.clone(),
            auth_env: self.auth_env.clone(),
            client_id_key: self.client_id_key.clone(),
            key_tags: KeyTags::new(self.private_key_tag.clone(), self.public_key_tag.clone()),
            http: HttpClientConfig {
                timeout: Duration::from_secs(self.http_timeout_secs),
                connect_timeout: Duration::from_secs(self.http_connect_timeout_secs),
                ..HttpClientConfig::default()
            },
        }
    }
}

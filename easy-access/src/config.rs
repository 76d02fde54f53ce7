//! Library configuration.

use crate::crypto::KeyTags;
use crate::flow::CompanionApp;
use crate::http::HttpClientConfig;

/// URI scheme registered by the companion app.
pub const DEFAULT_COMPANION_SCHEME: &str = "com.megical.easyaccess";

pub const DEFAULT_CLIENT_ID_KEY: &str = "easy_access.client_id";
pub const DEFAULT_PRIVATE_KEY_TAG: &str = "easy_access.client_key.private";
pub const DEFAULT_PUBLIC_KEY_TAG: &str = "easy_access.client_key.public";

#[derive(Debug, Clone)]
pub struct EasyAccessConfig {
    pub companion_scheme: String,
    /// Environment tag forwarded to the companion app as `authEnv`.
    pub auth_env: Option<String>,
    /// Secure storage key holding the registered client id.
    pub client_id_key: String,
    pub key_tags: KeyTags,
    pub http: HttpClientConfig,
}

impl Default for EasyAccessConfig {
    fn default() -> Self {
        Self {
            companion_scheme: DEFAULT_COMPANION_SCHEME.to_string(),
            auth_env: None,
            client_id_key: DEFAULT_CLIENT_ID_KEY.to_string(),
            key_tags: KeyTags::new(DEFAULT_PRIVATE_KEY_TAG, DEFAULT_PUBLIC_KEY_TAG),
            http: HttpClientConfig::default(),
        }
    }
}

impl EasyAccessConfig {
    pub fn companion_app(&self) -> CompanionApp {
        CompanionApp::new(self.companion_scheme.clone(), self.auth_env.clone())
    }
}

//! Orchestrates the authorization code flow through the companion app.
//!
//! One attempt runs discovery, login initiation and handoff from [`Authorizer::authorize`],
//! then finishes in [`Authorizer::handle_auth_code_callback`] once the redirect interceptor
//! reports the authorization response. Every attempt carries a generation number. Starting a
//! new attempt or calling [`Authorizer::cancel`] retires older generations, and so does the
//! attempt finishing or failing. Completions for a retired session fail with `Superseded`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::handoff::{hand_off, HandoffMode, Launcher};
use super::redirect::AuthCodeReceived;
use super::session::{AuthPhase, AuthSession, CallbackUris};
use crate::config::EasyAccessConfig;
use crate::crypto::{KeyStore, PkceChallenge, PkceVerifier};
use crate::error::{network_error, url_error, Error, ErrorKind, Stage};
use crate::http::{expect_status, parse_json, Accept};
use crate::oidc::{
    exchange_token, fetch_metadata, fetch_signing_keys, register_client, verify_and_validate,
    AccessTokenResult, ClientRegistration, CodeExchange, ExpectedClaims, ProviderMetadata,
};
use crate::storage::SecureStorage;

/// Fixed scope requested at login.
pub const LOGIN_SCOPE: &str = "openid";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginInitiation {
    login_code: String,
    session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    session_id: &'a str,
    no_redirect: bool,
}

/// Build the login request: the authorization endpoint with exactly eight query parameters.
pub fn login_request_url(
    metadata: &ProviderMetadata,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    nonce: &str,
    challenge: &PkceChallenge,
) -> Result<Url, Error> {
    let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
        url_error(
            Stage::LoginInitiation,
            &metadata.authorization_endpoint,
            e,
        )
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("scope", LOGIN_SCOPE)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state)
        .append_pair("nonce", nonce)
        .append_pair("code_challenge", challenge.as_str())
        .append_pair("code_challenge_method", challenge.method());

    Ok(url)
}

/// Confirm a login session with the authorization server. Accepts HTTP 200 and 204.
pub async fn verify_session(
    client: &reqwest::Client,
    session_id: &str,
    verify_endpoint: &str,
) -> Result<(), Error> {
    let url = Url::parse(verify_endpoint)
        .map_err(|e| url_error(Stage::Verify, verify_endpoint, e))?;

    let response = client
        .post(url)
        .json(&VerifyRequest {
            session_id,
            no_redirect: false,
        })
        .send()
        .await
        .map_err(|e| network_error(Stage::Verify, e))?;
    expect_status(response, Accept::Only(&[200, 204]), Stage::Verify).await?;

    Ok(())
}

/// Drives registration and authorization for one installation.
pub struct Authorizer {
    config: EasyAccessConfig,
    http: reqwest::Client,
    storage: Arc<dyn SecureStorage>,
    key_store: Arc<dyn KeyStore>,
    launcher: Arc<dyn Launcher>,
    generation: AtomicU64,
    active: RwLock<Option<AuthSession>>,
    phase: RwLock<AuthPhase>,
}

impl Authorizer {
    pub fn new(
        config: EasyAccessConfig,
        http: reqwest::Client,
        storage: Arc<dyn SecureStorage>,
        key_store: Arc<dyn KeyStore>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            config,
            http,
            storage,
            key_store,
            launcher,
            generation: AtomicU64::new(0),
            active: RwLock::new(None),
            phase: RwLock::new(AuthPhase::Idle),
        }
    }

    pub fn config(&self) -> &EasyAccessConfig {
        &self.config
    }

    pub async fn phase(&self) -> AuthPhase {
        self.phase.read().await.clone()
    }

    pub async fn active_session(&self) -> Option<AuthSession> {
        self.active.read().await.clone()
    }

    /// The persisted client id, or `NotRegistered`.
    pub async fn client_id(&self) -> Result<String, Error> {
        match self.storage.get_string(&self.config.client_id_key).await? {
            Some(client_id) if !client_id.is_empty() => Ok(client_id),
            _ => Err(Error::new(
                Stage::LoginInitiation,
                ErrorKind::NotRegistered,
                "no client id has been registered",
            )),
        }
    }

    pub async fn is_registered(&self) -> Result<bool, Error> {
        match self.client_id().await {
            Ok(_) => Ok(true),
            Err(e) if e.error_kind == ErrorKind::NotRegistered => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Register this installation, creating its key pair on first use.
    pub async fn register(
        &self,
        auth_server_address: &str,
        client_token: &str,
        device_id: &str,
        redirect_uris: Vec<String>,
    ) -> Result<String, Error> {
        let key = self.key_store.get_or_create(&self.config.key_tags).await?;
        let registration = ClientRegistration {
            client_token: client_token.to_string(),
            redirect_uris,
            public_key: key.to_jwk(),
            device_id: device_id.to_string(),
        };

        register_client(
            &self.http,
            self.storage.as_ref(),
            auth_server_address,
            &registration,
            &self.config.client_id_key,
        )
        .await
    }

    /// Start an authorization attempt and hand the login code to the companion app.
    ///
    /// Any previous attempt is superseded. On success the phase is `AwaitingRedirect` and the
    /// returned session is the active one.
    pub async fn authorize(
        &self,
        auth_server_address: &str,
        callbacks: CallbackUris,
        mode: HandoffMode,
    ) -> Result<AuthSession, Error> {
        let generation = self.begin_attempt().await;
        let result = self
            .run_authorize(generation, auth_server_address, callbacks, mode)
            .await;
        if let Err(e) = &result {
            self.fail(generation, e).await;
        }
        result
    }

    async fn run_authorize(
        &self,
        generation: u64,
        auth_server_address: &str,
        callbacks: CallbackUris,
        mode: HandoffMode,
    ) -> Result<AuthSession, Error> {
        let client_id = self.client_id().await?;

        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();
        let verifier = PkceVerifier::generate()?;
        let challenge = verifier.challenge();

        self.set_phase(generation, AuthPhase::DiscoveringMetadata)
            .await;
        let metadata = fetch_metadata(&self.http, auth_server_address).await?;
        self.ensure_current(generation, Stage::Discovery)?;

        self.set_phase(generation, AuthPhase::InitiatingLogin).await;
        let url = login_request_url(
            &metadata,
            &client_id,
            &callbacks.oauth_redirect,
            &state,
            &nonce,
            &challenge,
        )?;
        info!("Initiating login at {}", metadata.authorization_endpoint);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(Stage::LoginInitiation, e))?;
        let response = expect_status(response, Accept::Only(&[200]), Stage::LoginInitiation).await?;
        let login: LoginInitiation = parse_json(response, Stage::LoginInitiation).await?;

        let session = AuthSession {
            generation,
            client_id,
            state,
            nonce,
            verifier,
            challenge,
            metadata,
            login_code: login.login_code,
            session_id: login.session_id,
            callbacks,
        };

        {
            let mut active = self.active.write().await;
            self.ensure_current(generation, Stage::LoginInitiation)?;
            *active = Some(session.clone());
        }

        self.set_phase(generation, AuthPhase::AwaitingAppHandoff)
            .await;
        let uri = self
            .config
            .companion_app()
            .login_uri(&session.login_code, &session.callbacks.companion_return);
        hand_off(self.launcher.as_ref(), &uri, mode, Stage::Handoff).await?;
        self.ensure_current(generation, Stage::Handoff)?;

        self.set_phase(generation, AuthPhase::AwaitingRedirect).await;
        debug!("Awaiting redirect for session {}", session.session_id);
        Ok(session)
    }

    /// Confirm the login session out of band.
    pub async fn verify(&self, session_id: &str, verify_endpoint: &str) -> Result<(), Error> {
        verify_session(&self.http, session_id, verify_endpoint).await
    }

    /// Confirm the active session identified by its login code.
    pub async fn verify_login(&self, login_code: &str, verify_endpoint: &str) -> Result<(), Error> {
        let session_id = match self.active.read().await.as_ref() {
            Some(session) if session.login_code == login_code => session.session_id.clone(),
            _ => {
                return Err(Error::new(
                    Stage::Verify,
                    ErrorKind::SessionMismatch,
                    "login code does not belong to the active session",
                ))
            }
        };
        self.verify(&session_id, verify_endpoint).await
    }

    /// Finish `session` with the authorization response the interceptor captured.
    ///
    /// Checks the state, exchanges the code with a signed client assertion, then verifies the
    /// ID token against the provider's first published key and validates its claims.
    pub async fn handle_auth_code_callback(
        &self,
        event: &AuthCodeReceived,
        session: &AuthSession,
    ) -> Result<AccessTokenResult, Error> {
        self.ensure_current(session.generation, Stage::Redirect)?;
        if event.state != session.state {
            warn!("Redirect state does not match the active session");
            let err = Error::new(
                Stage::Redirect,
                ErrorKind::SessionMismatch,
                "state mismatch",
            );
            self.fail(session.generation, &err).await;
            return Err(err);
        }

        let result = self.run_exchange(event, session).await;
        match &result {
            Ok(_) => {
                self.discard(session.generation, AuthPhase::Complete).await;
                info!("Authorization complete for client {}", session.client_id);
            }
            Err(e) => self.fail(session.generation, e).await,
        }
        result
    }

    async fn run_exchange(
        &self,
        event: &AuthCodeReceived,
        session: &AuthSession,
    ) -> Result<AccessTokenResult, Error> {
        self.set_phase(session.generation, AuthPhase::ExchangingToken)
            .await;
        let key = self.key_store.get_or_create(&self.config.key_tags).await?;
        let tokens = exchange_token(
            &self.http,
            &session.metadata,
            CodeExchange {
                auth_code: &event.code,
                redirect_uri: &session.callbacks.oauth_redirect,
                verifier: &session.verifier,
                client_id: &session.client_id,
            },
            &key,
        )
        .await?;
        self.ensure_current(session.generation, Stage::TokenExchange)?;

        self.set_phase(session.generation, AuthPhase::Validating)
            .await;
        let jwks = fetch_signing_keys(&self.http, &session.metadata.jwks_uri).await?;
        verify_and_validate(
            tokens.id_token(),
            &jwks,
            ExpectedClaims {
                issuer: &session.metadata.issuer,
                client_id: &session.client_id,
                nonce: &session.nonce,
            },
        )?;
        self.ensure_current(session.generation, Stage::IdTokenValidation)?;

        Ok(tokens)
    }

    /// Finish the active session, whatever it is.
    pub async fn complete(&self, event: &AuthCodeReceived) -> Result<AccessTokenResult, Error> {
        let session = self.active.read().await.clone().ok_or_else(|| {
            Error::new(
                Stage::Redirect,
                ErrorKind::SessionMismatch,
                "no authorization in progress",
            )
        })?;
        self.handle_auth_code_callback(event, &session).await
    }

    /// Abandon the current attempt. Late completions for it fail with `Superseded`.
    pub async fn cancel(&self) {
        self.begin_attempt().await;
        *self.phase.write().await = AuthPhase::Idle;
        info!("Authorization cancelled");
    }

    async fn begin_attempt(&self) -> u64 {
        let mut active = self.active.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *active = None;
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn ensure_current(&self, generation: u64, stage: Stage) -> Result<(), Error> {
        if self.is_current(generation) {
            Ok(())
        } else {
            debug!("Attempt {} was superseded", generation);
            Err(Error::new(
                stage,
                ErrorKind::Superseded,
                "a newer authorization attempt replaced this one",
            ))
        }
    }

    async fn set_phase(&self, generation: u64, phase: AuthPhase) {
        let mut current = self.phase.write().await;
        if self.is_current(generation) {
            debug!("Authorization phase {:?}", phase);
            *current = phase;
        }
    }

    async fn fail(&self, generation: u64, err: &Error) {
        if err.error_kind == ErrorKind::Superseded {
            return;
        }
        warn!("Authorization failed: {}", err);
        self.discard(generation, AuthPhase::Failed(err.error_kind.clone()))
            .await;
    }

    /// Drop the session of `generation` and retire the generation, so the discarded session
    /// can no longer be completed.
    async fn discard(&self, generation: u64, phase: AuthPhase) {
        let mut active = self.active.write().await;
        if !self.is_current(generation) {
            return;
        }
        *active = None;
        debug!("Authorization phase {:?}", phase);
        *self.phase.write().await = phase;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::discovery::DISCOVERY_PATH;
    use crate::storage::MemorySecureStorage;
    use crate::test_support::{server_key, test_config, RecordingLauncher, StaticKeyStore};
    use chrono::Utc;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;

    const CLIENT_ID: &str = "abc-123";
    const ISSUER: &str = "https://idp.example/";
    const OAUTH_CALLBACK: &str = "com.example.app:/oauth-callback";
    const COMPANION_CALLBACK: &str = "com.example.app:/easyaccess";

    fn callbacks() -> CallbackUris {
        CallbackUris::new(OAUTH_CALLBACK, COMPANION_CALLBACK)
    }

    async fn authorizer(registered: bool, launcher: Arc<RecordingLauncher>) -> Authorizer {
        let config = test_config();
        let storage = Arc::new(MemorySecureStorage::new());
        if registered {
            storage
                .set_string(&config.client_id_key, CLIENT_ID)
                .await
                .unwrap();
        }
        Authorizer::new(
            config,
            reqwest::Client::new(),
            storage,
            Arc::new(StaticKeyStore),
            launcher,
        )
    }

    async fn mock_discovery(server: &mut ServerGuard) -> Mock {
        let base = server.url();
        server
            .mock("GET", DISCOVERY_PATH)
            .with_status(200)
            .with_body(
                json!({
                    "issuer": ISSUER,
                    "authorization_endpoint": format!("{}/auth", base),
                    "token_endpoint": format!("{}/token", base),
                    "jwks_uri": format!("{}/jwks", base)
                })
                .to_string(),
            )
            .expect_at_least(1)
            .create_async()
            .await
    }

    async fn mock_login(server: &mut ServerGuard) -> Mock {
        server
            .mock("GET", "/auth")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
                Matcher::UrlEncoded("scope".into(), "openid".into()),
                Matcher::UrlEncoded("response_type".into(), "code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), OAUTH_CALLBACK.into()),
                Matcher::UrlEncoded("code_challenge_method".into(), "S256".into()),
                Matcher::Regex("state=[0-9a-f-]{36}".into()),
                Matcher::Regex("nonce=[0-9a-f-]{36}".into()),
                Matcher::Regex("code_challenge=[A-Za-z0-9_-]{43}".into()),
            ]))
            .with_status(200)
            .with_body(json!({"loginCode": "L1", "sessionId": "SID"}).to_string())
            .expect_at_least(1)
            .create_async()
            .await
    }

    fn id_token_for(session: &AuthSession) -> String {
        server_key()
            .sign_jwt(
                "server",
                &json!({
                    "iss": ISSUER,
                    "sub": "user-1",
                    "aud": [CLIENT_ID],
                    "exp": Utc::now().timestamp() + 300,
                    "iat": Utc::now().timestamp(),
                    "nonce": session.nonce
                }),
            )
            .unwrap()
    }

    fn redirect_for(session: &AuthSession) -> AuthCodeReceived {
        AuthCodeReceived {
            code: "C1".to_string(),
            scope: "openid".to_string(),
            state: session.state.clone(),
        }
    }

    #[test]
    fn test_login_request_url_has_eight_parameters() {
        let metadata = ProviderMetadata {
            issuer: ISSUER.to_string(),
            authorization_endpoint: "https://idp.example/auth".to_string(),
            token_endpoint: "https://idp.example/token".to_string(),
            jwks_uri: "https://idp.example/jwks".to_string(),
        };
        let verifier = PkceVerifier::from_string("v".repeat(128));
        let url = login_request_url(
            &metadata,
            CLIENT_ID,
            OAUTH_CALLBACK,
            "S1",
            "N1",
            &verifier.challenge(),
        )
        .unwrap();

        assert_eq!(url.host_str(), Some("idp.example"));
        assert_eq!(url.path(), "/auth");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 8);
        assert!(pairs.contains(&("client_id".to_string(), CLIENT_ID.to_string())));
        assert!(pairs.contains(&("redirect_uri".to_string(), OAUTH_CALLBACK.to_string())));
        assert!(pairs.contains(&("state".to_string(), "S1".to_string())));
        assert!(pairs.contains(&("nonce".to_string(), "N1".to_string())));
        assert!(pairs.contains(&(
            "code_challenge".to_string(),
            verifier.challenge().as_str().to_string()
        )));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "S256".to_string())));
    }

    #[tokio::test]
    async fn test_full_authorization_flow() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let login = mock_login(&mut server).await;
        let launcher = Arc::new(RecordingLauncher::new(true));
        let authorizer = authorizer(true, launcher.clone()).await;

        let session = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        login.assert_async().await;

        assert_eq!(session.login_code, "L1");
        assert_eq!(session.session_id, "SID");
        assert_ne!(session.state, session.nonce);
        assert_eq!(authorizer.phase().await, AuthPhase::AwaitingRedirect);
        assert_eq!(
            launcher.opened().await,
            vec![format!(
                "com.megical.easyaccess:/auth?loginCode=L1&authCallback={}",
                urlencoding::encode(COMPANION_CALLBACK)
            )]
        );

        let token = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("code".into(), "C1".into()),
                Matcher::UrlEncoded("code_verifier".into(), session.verifier.as_str().into()),
                Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "at",
                    "expires_in": 3600,
                    "id_token": id_token_for(&session),
                    "scope": "openid",
                    "token_type": "Bearer"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _jwks = server
            .mock("GET", "/jwks")
            .with_status(200)
            .with_body(json!({"keys": [server_key().to_jwk()]}).to_string())
            .create_async()
            .await;

        let tokens = authorizer.complete(&redirect_for(&session)).await.unwrap();

        token.assert_async().await;
        assert_eq!(tokens.access_token(), "at");
        assert_eq!(authorizer.phase().await, AuthPhase::Complete);
        assert!(authorizer.active_session().await.is_none());

        // The completed session cannot be exchanged again.
        let err = authorizer
            .handle_auth_code_callback(&redirect_for(&session), &session)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Superseded);
        assert_eq!(authorizer.phase().await, AuthPhase::Complete);
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_authorize_requires_registration() {
        let server = Server::new_async().await;
        let authorizer = authorizer(false, Arc::new(RecordingLauncher::new(true))).await;

        let err = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::NotRegistered);
        assert_eq!(
            authorizer.phase().await,
            AuthPhase::Failed(ErrorKind::NotRegistered)
        );
    }

    #[tokio::test]
    async fn test_register_then_authorize() {
        let mut server = Server::new_async().await;
        let registration = server
            .mock("POST", "/api/v1/client")
            .match_body(Matcher::PartialJson(json!({
                "clientToken": "T",
                "deviceId": "D",
                "redirectUrls": [OAUTH_CALLBACK],
                "key": {"kty": "RSA", "use": "sig", "e": "AQAB"}
            })))
            .with_status(201)
            .with_body(json!({"clientId": CLIENT_ID}).to_string())
            .create_async()
            .await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let authorizer = authorizer(false, Arc::new(RecordingLauncher::new(true))).await;

        assert!(!authorizer.is_registered().await.unwrap());
        let client_id = authorizer
            .register(&server.url(), "T", "D", vec![OAUTH_CALLBACK.to_string()])
            .await
            .unwrap();
        registration.assert_async().await;
        assert_eq!(client_id, CLIENT_ID);
        assert!(authorizer.is_registered().await.unwrap());

        let session = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        assert_eq!(session.client_id, CLIENT_ID);
    }

    #[tokio::test]
    async fn test_missing_id_token_fails_exchange() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let _token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "at",
                    "expires_in": 3600,
                    "scope": "openid",
                    "token_type": "Bearer"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;

        let session = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        let err = authorizer
            .handle_auth_code_callback(&redirect_for(&session), &session)
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Parse);
        assert_eq!(authorizer.phase().await, AuthPhase::Failed(ErrorKind::Parse));
        assert!(authorizer.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_state_mismatch() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;

        let session = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        let mut event = redirect_for(&session);
        event.state = "forged".to_string();

        let err = authorizer
            .handle_auth_code_callback(&event, &session)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::SessionMismatch);
        assert_eq!(
            authorizer.phase().await,
            AuthPhase::Failed(ErrorKind::SessionMismatch)
        );
        assert!(authorizer.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_session_cannot_be_retried() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let token = server
            .mock("POST", "/token")
            .with_status(500)
            .expect(0)
            .create_async()
            .await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;

        let session = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        let mut forged = redirect_for(&session);
        forged.state = "forged".to_string();
        authorizer
            .handle_auth_code_callback(&forged, &session)
            .await
            .unwrap_err();

        let err = authorizer
            .handle_auth_code_callback(&redirect_for(&session), &session)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Superseded);
        assert_eq!(
            authorizer.phase().await,
            AuthPhase::Failed(ErrorKind::SessionMismatch)
        );
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_new_attempt_supersedes_old_session() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;

        let first = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        let second = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        assert_ne!(first.state, second.state);

        let err = authorizer
            .handle_auth_code_callback(&redirect_for(&first), &first)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Superseded);
        assert_eq!(authorizer.phase().await, AuthPhase::AwaitingRedirect);
        assert_eq!(
            authorizer.active_session().await.map(|s| s.state),
            Some(second.state)
        );
    }

    #[tokio::test]
    async fn test_cancel_supersedes_session() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;

        let session = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();
        authorizer.cancel().await;

        assert_eq!(authorizer.phase().await, AuthPhase::Idle);
        let err = authorizer
            .handle_auth_code_callback(&redirect_for(&session), &session)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Superseded);

        let err = authorizer.complete(&redirect_for(&session)).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::SessionMismatch);
    }

    #[tokio::test]
    async fn test_app_launch_failure_then_qr_fallback() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let launcher = Arc::new(RecordingLauncher::new(false));
        let authorizer = authorizer(true, launcher.clone()).await;

        let err = authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::AppLaunchFailed);
        assert_eq!(
            authorizer.phase().await,
            AuthPhase::Failed(ErrorKind::AppLaunchFailed)
        );

        authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::QrCode)
            .await
            .unwrap();
        let opened = launcher.opened().await;
        let qr = launcher.qr_codes().await;
        assert_eq!(qr.len(), 1);
        assert_eq!(qr[0], opened[0]);
    }

    #[tokio::test]
    async fn test_verify_accepts_204() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/verify")
            .match_body(Matcher::Json(json!({"sessionId": "SID", "noRedirect": false})))
            .with_status(204)
            .create_async()
            .await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;

        authorizer
            .verify("SID", &format!("{}/verify", server.url()))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_rejects_other_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/verify")
            .with_status(201)
            .create_async()
            .await;

        let err = verify_session(
            &reqwest::Client::new(),
            "SID",
            &format!("{}/verify", server.url()),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.error_kind,
            ErrorKind::BadStatus { status: 201, .. }
        ));
    }

    #[tokio::test]
    async fn test_verify_login_by_login_code() {
        let mut server = Server::new_async().await;
        let _discovery = mock_discovery(&mut server).await;
        let _login = mock_login(&mut server).await;
        let verify = server
            .mock("POST", "/verify")
            .match_body(Matcher::PartialJson(json!({"sessionId": "SID"})))
            .with_status(200)
            .create_async()
            .await;
        let authorizer = authorizer(true, Arc::new(RecordingLauncher::new(true))).await;
        authorizer
            .authorize(&server.url(), callbacks(), HandoffMode::AppSwitch)
            .await
            .unwrap();

        let endpoint = format!("{}/verify", server.url());
        authorizer.verify_login("L1", &endpoint).await.unwrap();
        verify.assert_async().await;

        let err = authorizer
            .verify_login("other", &endpoint)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::SessionMismatch);
    }
}

//! State carried through one authorization or signing attempt.

use crate::crypto::{PkceChallenge, PkceVerifier};
use crate::error::ErrorKind;
use crate::oidc::ProviderMetadata;

/// The two callbacks an authorization attempt uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUris {
    /// Where the authorization server redirects with the code.
    pub oauth_redirect: String,
    /// Where the companion app returns control after approval.
    pub companion_return: String,
}

impl CallbackUris {
    pub fn new(oauth_redirect: impl Into<String>, companion_return: impl Into<String>) -> Self {
        Self {
            oauth_redirect: oauth_redirect.into(),
            companion_return: companion_return.into(),
        }
    }
}

/// One in-flight authorization attempt.
///
/// `state`, `nonce` and `verifier` are fresh per attempt and the session is dropped after
/// token exchange or on failure.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Attempt counter; a session whose generation is no longer current is stale.
    pub generation: u64,
    pub client_id: String,
    pub state: String,
    pub nonce: String,
    pub verifier: PkceVerifier,
    pub challenge: PkceChallenge,
    pub metadata: ProviderMetadata,
    pub login_code: String,
    pub session_id: String,
    pub callbacks: CallbackUris,
}

/// Observable progress of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthPhase {
    Idle,
    DiscoveringMetadata,
    InitiatingLogin,
    AwaitingAppHandoff,
    AwaitingRedirect,
    ExchangingToken,
    Validating,
    Complete,
    Failed(ErrorKind),
}

impl AuthPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthPhase::Complete | AuthPhase::Failed(_))
    }
}

/// A pending signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignSession {
    pub signature_code: String,
    pub data_to_sign: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(AuthPhase::Complete.is_terminal());
        assert!(AuthPhase::Failed(ErrorKind::Network).is_terminal());
        assert!(!AuthPhase::Idle.is_terminal());
        assert!(!AuthPhase::AwaitingRedirect.is_terminal());
    }
}

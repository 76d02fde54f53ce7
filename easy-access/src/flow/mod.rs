//! Authorization and signing flows built on the protocol calls.

pub mod authorizer;
pub mod handoff;
pub mod redirect;
pub mod session;
pub mod sign;

pub use authorizer::{login_request_url, verify_session, Authorizer, LOGIN_SCOPE};
pub use handoff::{CompanionApp, HandoffMode, Launcher};
pub use redirect::{AuthCodeReceived, InterceptedResponse, RedirectInterceptor};
pub use session::{AuthPhase, AuthSession, CallbackUris, SignSession};
pub use sign::Signer;

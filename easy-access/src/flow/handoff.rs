//! Handing control to the companion app, by app switch or QR code.

use async_trait::async_trait;
use tracing::{info, warn};
use urlencoding::encode;

use crate::error::{Error, ErrorKind, Stage};

/// Host-provided bridge to the platform's URI launcher and QR presentation.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Ask the platform to open `uri`. Returns whether some app handled it.
    async fn open_uri(&self, uri: &str) -> bool;

    /// Show `payload` as a QR code for another device to scan.
    async fn present_qr(&self, payload: &str);
}

/// How the handoff URI reaches the companion app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoffMode {
    /// Open the companion app on this device.
    #[default]
    AppSwitch,
    /// Display the same URI as a QR code.
    QrCode,
}

/// Builds companion app URIs for a given scheme and optional environment tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionApp {
    scheme: String,
    auth_env: Option<String>,
}

impl CompanionApp {
    pub fn new(scheme: impl Into<String>, auth_env: Option<String>) -> Self {
        Self {
            scheme: scheme.into(),
            auth_env,
        }
    }

    /// `{scheme}:/auth?loginCode=..&authCallback=..[&authEnv=..]`
    pub fn login_uri(&self, login_code: &str, auth_callback: &str) -> String {
        let mut uri = format!(
            "{}:/auth?loginCode={}&authCallback={}",
            self.scheme,
            encode(login_code),
            encode(auth_callback)
        );
        if let Some(env) = &self.auth_env {
            uri.push_str(&format!("&authEnv={}", encode(env)));
        }
        uri
    }

    /// `{scheme}:/signature?signatureCode=..&signatureCallback=..[&authEnv=..]`
    pub fn signature_uri(&self, signature_code: &str, signature_callback: &str) -> String {
        let mut uri = format!(
            "{}:/signature?signatureCode={}&signatureCallback={}",
            self.scheme,
            encode(signature_code),
            encode(signature_callback)
        );
        if let Some(env) = &self.auth_env {
            uri.push_str(&format!("&authEnv={}", encode(env)));
        }
        uri
    }
}

/// Deliver `uri` through the launcher.
///
/// App switch fails with `AppLaunchFailed` when nothing handled the URI. QR presentation
/// cannot fail.
pub(crate) async fn hand_off(
    launcher: &dyn Launcher,
    uri: &str,
    mode: HandoffMode,
    stage: Stage,
) -> Result<(), Error> {
    match mode {
        HandoffMode::AppSwitch => {
            info!("Opening companion app");
            if launcher.open_uri(uri).await {
                Ok(())
            } else {
                warn!("Companion app did not handle the handoff URI");
                Err(Error::new(
                    stage,
                    ErrorKind::AppLaunchFailed,
                    "companion app is not installed",
                ))
            }
        }
        HandoffMode::QrCode => {
            info!("Presenting handoff as QR code");
            launcher.present_qr(uri).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingLauncher;

    #[test]
    fn test_login_uri() {
        let app = CompanionApp::new("com.megical.easyaccess", None);
        assert_eq!(
            app.login_uri("L1", "com.example.app:/easyaccess"),
            "com.megical.easyaccess:/auth?loginCode=L1&authCallback=com.example.app%3A%2Feasyaccess"
        );
    }

    #[test]
    fn test_login_uri_with_env() {
        let app = CompanionApp::new("com.megical.easyaccess", Some("test".to_string()));
        assert!(app
            .login_uri("L1", "cb")
            .ends_with("&authCallback=cb&authEnv=test"));
    }

    #[test]
    fn test_signature_uri() {
        let app = CompanionApp::new("com.megical.easyaccess", Some("test".to_string()));
        assert_eq!(
            app.signature_uri("S 1", "cb"),
            "com.megical.easyaccess:/signature?signatureCode=S%201&signatureCallback=cb&authEnv=test"
        );

        let app = CompanionApp::new("com.megical.easyaccess", None);
        assert!(!app.signature_uri("S1", "cb").contains("authEnv"));
    }

    #[tokio::test]
    async fn test_hand_off_app_switch() {
        let launcher = RecordingLauncher::new(true);
        hand_off(&launcher, "x:/auth", HandoffMode::AppSwitch, Stage::Handoff)
            .await
            .unwrap();
        assert_eq!(launcher.opened().await, vec!["x:/auth".to_string()]);
    }

    #[tokio::test]
    async fn test_hand_off_not_handled() {
        let launcher = RecordingLauncher::new(false);
        let err = hand_off(&launcher, "x:/auth", HandoffMode::AppSwitch, Stage::Handoff)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::AppLaunchFailed);
    }

    #[tokio::test]
    async fn test_hand_off_qr_uses_same_uri() {
        let launcher = RecordingLauncher::new(false);
        hand_off(&launcher, "x:/auth", HandoffMode::QrCode, Stage::Handoff)
            .await
            .unwrap();
        assert!(launcher.opened().await.is_empty());
        assert_eq!(launcher.qr_codes().await, vec!["x:/auth".to_string()]);
    }
}

//! Intercepts navigations to registered callback URIs.
//!
//! The host routes every outgoing navigation through [`RedirectInterceptor::intercept`].
//! Matching requests never reach the network: the interceptor answers with a synthetic
//! 200 and publishes the authorization response to its channel.

use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::error::{url_error, Error, Stage};

/// Authorization response captured from a callback navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCodeReceived {
    pub code: String,
    pub scope: String,
    pub state: String,
}

impl AuthCodeReceived {
    /// Read `code`, `scope` and `state` from the query. `None` if any is missing.
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut code = None;
        let mut scope = None;
        let mut state = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "code" => code = Some(value.into_owned()),
                "scope" => scope = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Self {
            code: code?,
            scope: scope?,
            state: state?,
        })
    }
}

/// Response handed back to the host in place of the real request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedResponse {
    pub url: Url,
    pub status: u16,
}

/// Matches navigations against callback URIs by scheme, host and path.
#[derive(Debug)]
pub struct RedirectInterceptor {
    callbacks: Vec<Url>,
    events: mpsc::UnboundedSender<AuthCodeReceived>,
}

impl RedirectInterceptor {
    /// Create an interceptor for `callbacks` and the receiver its events are published to.
    pub fn new<S: AsRef<str>>(
        callbacks: &[S],
    ) -> Result<(Self, mpsc::UnboundedReceiver<AuthCodeReceived>), Error> {
        let callbacks = callbacks
            .iter()
            .map(|c| Url::parse(c.as_ref()).map_err(|e| url_error(Stage::Redirect, c.as_ref(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        let (events, receiver) = mpsc::unbounded_channel();

        Ok((Self { callbacks, events }, receiver))
    }

    /// Whether `url` targets one of the registered callbacks.
    pub fn matches(&self, url: &Url) -> bool {
        self.callbacks.iter().any(|callback| {
            callback.scheme() == url.scheme()
                && callback.host_str() == url.host_str()
                && callback.path() == url.path()
        })
    }

    /// Handle one navigation.
    ///
    /// Returns `None` to let the request through: either it does not match a callback or it
    /// lacks one of `code`, `scope` and `state`. Never blocks.
    pub fn intercept(&self, url: &Url) -> Option<InterceptedResponse> {
        if !self.matches(url) {
            return None;
        }

        let Some(event) = AuthCodeReceived::from_url(url) else {
            debug!("Callback navigation without complete authorization response, passing through");
            return None;
        };

        if self.events.send(event).is_err() {
            warn!("Authorization response dropped, no receiver is listening");
        }

        Some(InterceptedResponse {
            url: url.clone(),
            status: 200,
        })
    }

    /// Parse and handle a raw navigation address. Unparseable addresses pass through.
    pub fn intercept_str(&self, address: &str) -> Option<InterceptedResponse> {
        Url::parse(address)
            .ok()
            .and_then(|url| self.intercept(&url))
    }
}

//! Client-side holder of the current user.
//!
//! A `Session` is created once by the top of the view tree and handed down
//! by reference. Only its own `&mut self` operations change it.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{api::AuthApi, error::ClientError, store::TokenStore};
use crate::auth::dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest};

/// How long a failed login/signup message stays visible.
pub const ERROR_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    /// A persisted token is being verified.
    Checking,
    Authenticated(PublicUser),
}

#[derive(Debug, Clone)]
struct TransientError {
    message: String,
    raised_at: Instant,
}

pub struct Session<A, S> {
    api: A,
    store: S,
    state: SessionState,
    submitting: bool,
    error: Option<TransientError>,
}

impl<A: AuthApi, S: TokenStore> Session<A, S> {
    pub fn new(api: A, store: S) -> Self {
        Self {
            api,
            store,
            state: SessionState::Unauthenticated,
            submitting: false,
            error: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&PublicUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn submitting(&self) -> bool {
        self.submitting
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The last login/signup failure, until it is older than [`ERROR_TTL`].
    pub fn error(&self) -> Option<&str> {
        self.error_at(Instant::now())
    }

    fn error_at(&self, now: Instant) -> Option<&str> {
        self.error
            .as_ref()
            .filter(|e| now.saturating_duration_since(e.raised_at) < ERROR_TTL)
            .map(|e| e.message.as_str())
    }

    /// Restores a persisted session, if any.
    pub async fn init(&mut self) -> &SessionState {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.state = SessionState::Unauthenticated;
                return &self.state;
            }
            Err(e) => {
                warn!(error = %e, "could not read stored token");
                self.discard_token();
                self.state = SessionState::Unauthenticated;
                return &self.state;
            }
        };

        self.state = SessionState::Checking;
        match self.api.verify(&token).await {
            Ok(user) => {
                debug!(user_id = user.id, "session restored");
                self.state = SessionState::Authenticated(user);
            }
            Err(e) => {
                warn!(error = %e, "token verification failed");
                self.discard_token();
                self.state = SessionState::Unauthenticated;
            }
        }
        &self.state
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let req = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        self.begin_submit();
        let outcome = self.api.login(&req).await;
        self.finish_submit(outcome)
    }

    pub async fn signup(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let req = SignupRequest {
            email: email.to_owned(),
            password: password.to_owned(),
            name: name.to_owned(),
        };
        self.begin_submit();
        let outcome = self.api.signup(&req).await;
        self.finish_submit(outcome)
    }

    fn begin_submit(&mut self) {
        self.error = None;
        self.submitting = true;
    }

    fn finish_submit(
        &mut self,
        outcome: Result<AuthResponse, ClientError>,
    ) -> Result<PublicUser, ClientError> {
        self.submitting = false;
        let result = outcome.and_then(|res| {
            self.store.save(&res.token)?;
            Ok(res.user)
        });
        match result {
            Ok(user) => {
                self.state = SessionState::Authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "authentication failed");
                self.error = Some(TransientError {
                    message: e.user_message(),
                    raised_at: Instant::now(),
                });
                self.state = SessionState::Unauthenticated;
                Err(e)
            }
        }
    }

    /// Ends the session locally. The server is notified in the background
    /// and its answer never blocks the teardown.
    pub fn logout(&mut self) -> Option<JoinHandle<()>> {
        let handle = self.notify_logout(None);
        self.discard_token();
        self.state = SessionState::Unauthenticated;
        self.error = None;
        handle
    }

    /// Page-unload hook: unless the page is only reloading, send a
    /// non-blocking logout beacon and drop the stored token.
    pub fn unload(&mut self, is_reload: bool) -> Option<JoinHandle<()>> {
        if is_reload {
            return None;
        }
        let handle = self.notify_logout(Some(Duration::from_secs(2)));
        if handle.is_some() {
            self.discard_token();
        }
        handle
    }

    /// Merges profile changes into the signed-in user.
    pub fn update_user(&mut self, update: impl FnOnce(&mut PublicUser)) {
        if let SessionState::Authenticated(user) = &mut self.state {
            update(user);
        }
    }

    fn notify_logout(&self, deadline: Option<Duration>) -> Option<JoinHandle<()>> {
        let token = match self.store.load() {
            Ok(token) => token?,
            Err(e) => {
                warn!(error = %e, "could not read stored token");
                return None;
            }
        };
        let api = self.api.clone();
        Some(tokio::spawn(async move {
            let call = api.logout(&token);
            let outcome = match deadline {
                Some(d) => match tokio::time::timeout(d, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        debug!("logout beacon timed out");
                        Ok(())
                    }
                },
                None => call.await,
            };
            if let Err(e) = outcome {
                warn!(error = %e, "logout notification failed");
            }
        }))
    }

    fn discard_token(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "could not clear stored token");
        }
    }
}

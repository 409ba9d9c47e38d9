use tokio::sync::watch;
use tracing::debug;

use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
}

impl SessionUser {
    pub fn with_token(uid: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            id_token: id_token.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    SignedOut,
    SignedIn(SessionUser),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Initializing)
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::Initializing | Self::SignedOut => None,
        }
    }
}

#[derive(Debug)]
pub struct SessionProvider {
    state_tx: watch::Sender<SessionState>,
}

impl SessionProvider {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initializing);
        Self { state_tx }
    }

    pub fn from_token(token: Option<&str>) -> Self {
        let provider = Self::new();
        match token {
            Some(token) => provider.sign_in(SessionUser::with_token("local", token)),
            None => provider.sign_out(),
        }
        provider
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state_rx: self.state_tx.subscribe(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn sign_in(&self, user: SessionUser) {
        debug!(uid = %user.uid, "session signed in");
        self.state_tx.send_replace(SessionState::SignedIn(user));
    }

    pub fn sign_out(&self) {
        debug!("session signed out");
        self.state_tx.send_replace(SessionState::SignedOut);
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn current(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Waits until the provider has resolved the session. A provider dropped
    /// while still initializing counts as signed out.
    pub async fn wait_ready(&self) -> SessionState {
        let mut state_rx = self.state_rx.clone();
        state_rx
            .wait_for(SessionState::is_ready)
            .await
            .map(|state| state.clone())
            .unwrap_or(SessionState::SignedOut)
    }

    pub async fn bearer_token(&self) -> Result<String, ApiError> {
        match self.wait_ready().await {
            SessionState::SignedIn(user) => Ok(user.id_token),
            SessionState::Initializing | SessionState::SignedOut => Err(ApiError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::{SessionProvider, SessionState, SessionUser};
    use crate::api::ApiError;

    #[tokio::test]
    async fn bearer_token_waits_for_initialization() {
        let provider = SessionProvider::new();
        let handle = provider.handle();

        let pending = tokio::spawn(async move { handle.bearer_token().await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        provider.sign_in(SessionUser::with_token("user-1", "token-abc"));
        let token = timeout(Duration::from_secs(1), pending)
            .await
            .expect("token wait should resolve after sign-in")
            .expect("task should not panic")
            .expect("signed-in session should yield a token");
        assert_eq!(token, "token-abc");
    }

    #[tokio::test]
    async fn bearer_token_fails_when_signed_out() {
        let provider = SessionProvider::from_token(None);
        let error = provider
            .handle()
            .bearer_token()
            .await
            .expect_err("signed-out session should fail");
        assert!(matches!(error, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn dropped_provider_during_initialization_counts_as_signed_out() {
        let provider = SessionProvider::new();
        let handle = provider.handle();
        drop(provider);

        assert_eq!(handle.wait_ready().await, SessionState::SignedOut);
    }

    #[test]
    fn configured_token_signs_in_local_user() {
        let provider = SessionProvider::from_token(Some("abc"));
        let state = provider.state();
        let user = state.user().expect("token should sign in");
        assert_eq!(user.id_token, "abc");
        assert_eq!(user.uid, "local");
    }
}

//! Session coordinator: the state machine behind "am I logged in" and
//! "give me a valid bearer token".
//!
//! All state changes go through one transition procedure executed under the
//! transition lock, so a refresh, a login and a logout can never interleave.
//! Callers that find the token stale queue on that lock; the first one
//! refreshes, the rest see that the state generation moved while they waited
//! and read the settled result instead of spending the refresh token again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::api::{ApiError, Endpoint, Transport};
use crate::auth::codec::{DecodedIdentity, TokenCodec};
use crate::auth::credentials::CredentialStore;
use crate::config::SessionOptions;
use crate::error::SessionError;
use crate::models::{CredentialPair, MessageResponse, RefreshRequest};

/// Externally visible state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
    /// A refresh call is in flight
    Refreshing,
}

#[derive(Debug, Default)]
struct SessionState {
    pair: Option<CredentialPair>,
    /// Always decoded from `pair`; both are written together.
    identity: Option<DecodedIdentity>,
    /// Bumped by every commit.
    generation: u64,
}

/// Held for the duration of a state transition.
type TransitionGuard<'a> = MutexGuard<'a, ()>;

/// Clears the in-flight flag when the refresh call ends, including when the
/// calling future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionCoordinator {
    options: SessionOptions,
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    state: RwLock<SessionState>,
    transition: Mutex<()>,
    refreshing: AtomicBool,
}

impl SessionCoordinator {
    /// Build a coordinator and establish its initial state from the
    /// credential store, refreshing a persisted pair whose access token has
    /// already expired.
    pub async fn init(
        options: SessionOptions,
        transport: Arc<dyn Transport>,
        store: CredentialStore,
    ) -> Self {
        let coordinator = Self {
            options,
            transport,
            store,
            state: RwLock::new(SessionState::default()),
            transition: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        };

        {
            let guard = coordinator.transition.lock().await;
            let loaded = coordinator.store.load();
            debug!(found = loaded.is_some(), "Loaded persisted credentials");
            coordinator.apply_new_pair(&guard, loaded).await;
        }

        info!(
            base_url = %coordinator.options.base_url,
            authenticated = coordinator.get_user().is_some(),
            "Session initialized"
        );
        coordinator
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in and return the identity of the new session.
    ///
    /// On any failure the session is cleared before the error is returned.
    pub async fn login<P: Serialize + ?Sized>(
        &self,
        credentials: &P,
    ) -> Result<DecodedIdentity, SessionError> {
        self.authenticate(Endpoint::Login, credentials).await
    }

    /// Register a new account and return the identity of the new session.
    ///
    /// On any failure the session is cleared before the error is returned.
    pub async fn register<P: Serialize + ?Sized>(
        &self,
        details: &P,
    ) -> Result<DecodedIdentity, SessionError> {
        self.authenticate(Endpoint::Register, details).await
    }

    async fn authenticate<P: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        payload: &P,
    ) -> Result<DecodedIdentity, SessionError> {
        let guard = self.transition.lock().await;

        match self.post_for::<CredentialPair, _>(endpoint, payload, None).await {
            Ok(pair) => self
                .apply_new_pair(&guard, Some(pair))
                .await
                .ok_or(SessionError::NoSession),
            Err(e) => {
                warn!(error = %e, endpoint = endpoint.path(), "Authentication failed, clearing session");
                self.apply_new_pair(&guard, None).await;
                Err(e)
            }
        }
    }

    /// Notify the server and end the session.
    ///
    /// The local session always ends anonymous, whatever the server says.
    pub async fn logout(&self) {
        let guard = self.transition.lock().await;

        if let Some(token) = self.get_auth_token() {
            if let Err(e) = self
                .post(Endpoint::Logout, &Value::Object(Default::default()), Some(&token))
                .await
            {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        self.apply_new_pair(&guard, None).await;
        info!("Logged out");
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Current access token, refreshed first if it is stale.
    ///
    /// Concurrent callers share a single refresh call. Fails with
    /// `NoSession` when the settled state has no credentials.
    pub async fn get_valid_token(&self) -> Result<String, SessionError> {
        let observed = {
            let state = self.read_state();
            if let Some(pair) = &state.pair {
                if !self.is_stale(&pair.access_token) {
                    return Ok(pair.access_token.clone());
                }
            }
            state.generation
        };

        let guard = self.transition.lock().await;
        let (generation, pair) = {
            let state = self.read_state();
            (state.generation, state.pair.clone())
        };

        if generation != observed {
            debug!(generation, "Session settled while waiting");
            return pair
                .map(|pair| pair.access_token)
                .ok_or(SessionError::NoSession);
        }

        let pair = pair.ok_or(SessionError::NoSession)?;
        self.refresh_locked(&guard, &pair).await
    }

    /// Exchange the refresh token for a new pair regardless of expiry.
    ///
    /// On failure the session is cleared before the error is returned.
    pub async fn refresh(&self) -> Result<String, SessionError> {
        let guard = self.transition.lock().await;
        let pair = self.read_state().pair.clone().ok_or(SessionError::NoSession)?;
        self.refresh_locked(&guard, &pair).await
    }

    async fn refresh_locked(
        &self,
        guard: &TransitionGuard<'_>,
        pair: &CredentialPair,
    ) -> Result<String, SessionError> {
        match self.request_refresh(&pair.refresh_token).await {
            Ok(refreshed) => {
                self.apply_new_pair(guard, Some(refreshed)).await;
                self.get_auth_token().ok_or(SessionError::NoSession)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.commit(guard, None);
                Err(e)
            }
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<CredentialPair, SessionError> {
        let _in_flight = InFlight::start(&self.refreshing);
        debug!("Refreshing credentials");
        self.post_for(Endpoint::RefreshToken, &RefreshRequest { refresh_token }, None)
            .await
    }

    fn is_stale(&self, access_token: &str) -> bool {
        TokenCodec::is_expired(access_token, self.options.refresh_skew_secs).unwrap_or(true)
    }

    // =========================================================================
    // State queries
    // =========================================================================

    /// Whether a user is logged in, once any in-flight transition settles.
    pub async fn is_authenticated(&self) -> bool {
        let _guard = self.transition.lock().await;
        self.read_state().identity.is_some()
    }

    /// Identity of the current session, without waiting
    pub fn get_user(&self) -> Option<DecodedIdentity> {
        self.read_state().identity.clone()
    }

    /// Current access token as-is, without waiting or refreshing
    pub fn get_auth_token(&self) -> Option<String> {
        self.read_state()
            .pair
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_refreshing() {
            SessionStatus::Refreshing
        } else if self.read_state().identity.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        }
    }

    // =========================================================================
    // Account endpoints
    // =========================================================================

    pub async fn forgot_password<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<MessageResponse, SessionError> {
        self.post_message(Endpoint::ForgotPassword, payload, None).await
    }

    pub async fn reset_password<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<MessageResponse, SessionError> {
        self.post_message(Endpoint::ResetPassword, payload, None).await
    }

    pub async fn change_password<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<MessageResponse, SessionError> {
        let token = self.get_valid_token().await?;
        self.post_message(Endpoint::ChangePassword, payload, Some(&token))
            .await
    }

    /// Save user data; the server answers with a reissued pair whose claims
    /// reflect the change.
    pub async fn save_user_data<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<DecodedIdentity, SessionError> {
        self.get_valid_token().await?;
        let guard = self.transition.lock().await;
        // A logout or refresh may have settled while we waited for the lock
        let token = self.get_auth_token().ok_or(SessionError::NoSession)?;
        let pair: CredentialPair = self
            .post_for(Endpoint::UserData, payload, Some(&token))
            .await?;
        self.apply_new_pair(&guard, Some(pair))
            .await
            .ok_or(SessionError::NoSession)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// The single place session state changes.
    ///
    /// An expired pair gets one refresh attempt; any failure along the way
    /// ends in the anonymous state. Returns the committed identity.
    async fn apply_new_pair(
        &self,
        guard: &TransitionGuard<'_>,
        pair: Option<CredentialPair>,
    ) -> Option<DecodedIdentity> {
        let pair = match pair {
            None => None,
            Some(pair) => match TokenCodec::is_expired(&pair.access_token, 0) {
                Ok(false) => Some(pair),
                Ok(true) => match self.request_refresh(&pair.refresh_token).await {
                    Ok(refreshed) => Some(refreshed),
                    Err(e) => {
                        warn!(error = %e, "Refresh of expired credentials failed");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Cannot read token expiry");
                    None
                }
            },
        };
        self.commit(guard, pair)
    }

    /// Write `pair` through to the store, then swap it and its identity in.
    ///
    /// The transition lock orders commits, so the store is written before
    /// the state lock is taken and readers are never blocked on storage I/O.
    /// A reader may see the previous pair while the store already holds the
    /// new one, never the reverse.
    fn commit(
        &self,
        _guard: &TransitionGuard<'_>,
        pair: Option<CredentialPair>,
    ) -> Option<DecodedIdentity> {
        let identity = match pair.as_ref().map(|pair| TokenCodec::decode(&pair.access_token)) {
            None => None,
            Some(Ok(identity)) => Some(identity),
            Some(Err(e)) => {
                warn!(error = %e, "Discarding undecodable credentials");
                None
            }
        };
        let pair = pair.filter(|_| identity.is_some());

        self.store.save(pair.as_ref());

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.pair = pair;
        state.identity = identity.clone();
        state.generation += 1;

        debug!(
            generation = state.generation,
            authenticated = state.identity.is_some(),
            "Session committed"
        );
        identity
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Transport helpers
    // =========================================================================

    async fn post<P: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        payload: &P,
        bearer: Option<&str>,
    ) -> Result<Value, SessionError> {
        let url = endpoint
            .url(&self.options.base_url)
            .map_err(|e| SessionError::InvalidBaseUrl(e.to_string()))?;
        let body = serde_json::to_value(payload)
            .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;

        let timeout = self.options.request_timeout;
        match tokio::time::timeout(timeout, self.transport.post(url, body, bearer)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ApiError::Timeout(timeout).into()),
        }
    }

    async fn post_for<T: DeserializeOwned, P: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        payload: &P,
        bearer: Option<&str>,
    ) -> Result<T, SessionError> {
        let value = self.post(endpoint, payload, bearer).await?;
        serde_json::from_value(value)
            .map_err(|e| SessionError::InvalidResponse(format!("{}: {}", endpoint.path(), e)))
    }

    async fn post_message<P: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        payload: &P,
        bearer: Option<&str>,
    ) -> Result<MessageResponse, SessionError> {
        match self.post(endpoint, payload, bearer).await? {
            Value::Null => Ok(MessageResponse::default()),
            value => serde_json::from_value(value)
                .map_err(|e| SessionError::InvalidResponse(format!("{}: {}", endpoint.path(), e))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

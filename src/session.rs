//! Session/auth state holder.
//!
//! Owns the bearer token, its expiry and the user profile. The token and
//! expiry are mirrored to a [`SessionStorage`] so a later run can restore the
//! session; the profile is always re-fetched from the server.

use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{RegisterRequest, UserProfile};
use crate::storage::{SessionStorage, EXPIRES_AT_KEY, TOKEN_KEY};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Option<UserProfile>,
}

pub struct SessionStore<S: SessionStorage> {
    storage: S,
    session: Option<Session>,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Create an empty holder without touching storage.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            session: None,
        }
    }

    /// Restore a persisted session and validate it.
    ///
    /// The stored expiry is checked first; only an unexpired token is sent to
    /// the server. Any failure leaves the holder logged out with storage
    /// cleared.
    pub fn restore(storage: S, api: &ApiClient) -> Self {
        Self::restore_at(storage, api, Utc::now())
    }

    pub fn restore_at(storage: S, api: &ApiClient, now: DateTime<Utc>) -> Self {
        let mut store = Self::new(storage);

        let token = store.storage.get(TOKEN_KEY);
        let expires_at = store
            .storage
            .get(EXPIRES_AT_KEY)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let (token, expires_at) = match (token, expires_at) {
            (Some(t), Some(e)) if !t.is_empty() => (t, e),
            (None, None) => return store,
            _ => {
                tracing::info!("discarding incomplete stored session");
                store.logout();
                return store;
            }
        };

        store.session = Some(Session {
            token,
            expires_at,
            user: None,
        });

        if !store.is_session_valid_at(now) {
            tracing::info!("stored session expired at {}", expires_at);
            return store;
        }

        if let Err(e) = store.refresh_profile(api) {
            tracing::warn!("stored session rejected: {}", e);
        }
        store
    }

    /// Store credentials and load the profile they belong to.
    pub fn login(
        &mut self,
        api: &ApiClient,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> ApiResult<&UserProfile> {
        self.login_at(api, token, expires_at, Utc::now())
    }

    pub fn login_at(
        &mut self,
        api: &ApiClient,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ApiResult<&UserProfile> {
        if token.is_empty() {
            return Err(ApiError::InvalidInput("empty token".to_string()));
        }
        if expires_at <= now {
            self.logout();
            return Err(ApiError::SessionExpired);
        }

        self.session = Some(Session {
            token: token.to_string(),
            expires_at,
            user: None,
        });
        self.persist();

        self.refresh_profile(api)?;
        self.user().ok_or(ApiError::NotAuthenticated)
    }

    /// `POST /api/Auth/login` followed by [`Self::login`].
    pub fn sign_in(&mut self, api: &ApiClient, email: &str, password: &str) -> ApiResult<&UserProfile> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }
        let resp = api.login(email.trim(), password)?;
        self.login(api, &resp.token, resp.expiration)
    }

    pub fn register(
        &self,
        api: &ApiClient,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<()> {
        if user_name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput(
                "name, email and password are required".to_string(),
            ));
        }
        api.register(&RegisterRequest {
            user_name: user_name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        })
    }

    /// Re-read the profile. A failure means the token is unusable, so the
    /// session is dropped.
    pub fn refresh_profile(&mut self, api: &ApiClient) -> ApiResult<&UserProfile> {
        let header = self.auth_header().ok_or(ApiError::NotAuthenticated)?;
        match api.me(&header) {
            Ok(profile) => {
                if let Some(session) = self.session.as_mut() {
                    session.user = Some(profile);
                }
                self.user().ok_or(ApiError::NotAuthenticated)
            }
            Err(e) => {
                self.logout();
                Err(e)
            }
        }
    }

    /// Drop the session from memory and storage.
    pub fn logout(&mut self) {
        self.session = None;
        for key in [TOKEN_KEY, EXPIRES_AT_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("failed to clear {}: {}", key, e);
            }
        }
    }

    /// `Authorization` header value, or `None` when there is no session.
    pub fn auth_header(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| format!("Bearer {}", s.token))
    }

    pub fn is_session_valid(&mut self) -> bool {
        self.is_session_valid_at(Utc::now())
    }

    /// Compare the expiry with `now`; an expired session is logged out.
    pub fn is_session_valid_at(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match &self.session {
            Some(s) => s.expires_at <= now,
            None => return false,
        };
        if expired {
            self.logout();
        }
        !expired
    }

    /// Header for a protected action, checking expiry first.
    pub fn require_auth(&mut self) -> ApiResult<String> {
        self.require_auth_at(Utc::now())
    }

    pub fn require_auth_at(&mut self, now: DateTime<Utc>) -> ApiResult<String> {
        let had_session = self.session.is_some();
        if !self.is_session_valid_at(now) {
            return Err(if had_session {
                ApiError::SessionExpired
            } else {
                ApiError::NotAuthenticated
            });
        }
        self.auth_header().ok_or(ApiError::NotAuthenticated)
    }

    /// Authenticated means a token whose profile has been loaded.
    #[cfg(test)]
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.has_role("Admin"))
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.session.as_ref().and_then(|s| s.user.as_ref())
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let token = session.token.clone();
        let expires = session.expires_at.to_rfc3339();
        if let Err(e) = self
            .storage
            .set(TOKEN_KEY, &token)
            .and_then(|_| self.storage.set(EXPIRES_AT_KEY, &expires))
        {
            tracing::warn!("session will not survive restart: {}", e);
        }
    }
}

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};

use super::{Credentials, Session, SessionStore, StoreError};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to store session: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    /// Message suitable for showing next to the login form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Api(e) => e.user_message(),
            AuthError::Storage(e) => format!("Signed in, but the session could not be saved: {}", e),
        }
    }
}

/// Login and logout against the backend, committing results to the
/// session store.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
}

impl AuthClient {
    pub fn new(api: ApiClient, store: Arc<dyn SessionStore>) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Exchange `credentials` for a token and store the resulting session.
    ///
    /// The store is only written after the backend confirms the login, so a
    /// failed attempt leaves any prior session in place.
    pub async fn login(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let token = match self.api.authenticate(&credentials).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, user = %credentials.identifier, "Login failed");
                return Err(e.into());
            }
        };

        let session = Session::new(token, credentials.identifier);
        self.store.save(session.clone())?;

        info!(user = %session.user_identifier, "Login successful");
        Ok(session)
    }

    /// Drop the local session. The backend is not notified.
    pub fn logout(&self) -> Result<(), StoreError> {
        let user = self.store.current_user_identifier();
        self.store.clear()?;
        info!(user = ?user, "Logged out");
        Ok(())
    }
}

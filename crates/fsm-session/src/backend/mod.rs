//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use async_trait::async_trait;
use fsm_security::User;
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::BackendError;

pub mod mock;
pub mod rest;

pub use mock::MockAuthBackend;
pub use rest::RestAuthBackend;

/// Response envelope shared by the authentication endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub successful: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            successful: true,
            data: Some(data),
            message: None,
        }
    }

    /// Unsuccessful envelope carrying only a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Unwrap the payload, mapping `successful: false` to [`BackendError::Rejected`].
    pub fn into_data(self) -> Result<T, BackendError> {
        if !self.successful {
            return Err(BackendError::Rejected {
                message: self
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Login failed".to_owned()),
            });
        }
        self.data
            .ok_or_else(|| BackendError::Decode("successful response without data".to_owned()))
    }
}

/// Payload of a successful `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    pub id: String,
    pub email: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
    #[serde(rename = "roleId", default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub admin: bool,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl LoginData {
    /// Credential to persist for this login.
    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::bearer(self.access_token.clone());
        credentials.refresh_token = self.refresh_token.clone();
        if let Some(kind) = self.token_type.as_ref().filter(|kind| !kind.trim().is_empty()) {
            credentials.token_type = kind.clone();
        }
        credentials
    }
}

/// Authentication service consulted by the session owner.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange email and password for a credential.
    async fn login(&self, email: &str, password: &str) -> Result<LoginData, BackendError>;

    /// Load the user (with roles) the credential belongs to.
    async fn current_user(&self, credentials: &Credentials) -> Result<User, BackendError>;

    /// Invalidate the credential server-side. The REST endpoint exposes no
    /// logout route, so the default does nothing.
    async fn logout(&self, _credentials: &Credentials) -> Result<(), BackendError> {
        Ok(())
    }
}

//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fsm_common::config::AuthConfig;
use fsm_security::User;
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ApiEnvelope, AuthBackend, LoginData};
use crate::credentials::Credentials;
use crate::error::BackendError;

const LOGIN_PATH: &str = "auth/login";
const ME_PATH: &str = "auth/me";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client for the console's authentication REST endpoints.
#[derive(Debug, Clone)]
pub struct RestAuthBackend {
    client: reqwest::Client,
    login_url: Url,
    me_url: Url,
}

impl RestAuthBackend {
    /// Build a client rooted at `base_url` (e.g. `https://fsm.example.com/api`).
    pub fn new(mut base_url: Url, timeout: Duration) -> Result<Self, BackendError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let login_url = endpoint(&base_url, LOGIN_PATH)?;
        let me_url = endpoint(&base_url, ME_PATH)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            login_url,
            me_url,
        })
    }

    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let base_url = config.base_url()?;
        Self::new(base_url, config.request_timeout)
            .context("failed to build authentication HTTP client")
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .filter(|message| !message.trim().is_empty());
            return Err(match (status, message) {
                (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, Some(message)) => {
                    BackendError::Rejected { message }
                }
                (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, None) => {
                    BackendError::Unauthorized
                }
                (status, message) => BackendError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }
        serde_json::from_slice::<ApiEnvelope<T>>(&body)
            .map_err(|err| BackendError::Decode(err.to_string()))?
            .into_data()
    }
}

fn endpoint(base_url: &Url, path: &'static str) -> Result<Url, BackendError> {
    base_url
        .join(path)
        .map_err(|source| BackendError::InvalidEndpoint { path, source })
}

#[async_trait]
impl AuthBackend for RestAuthBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginData, BackendError> {
        debug!(url = %self.login_url, "posting login");
        let response = self
            .client
            .post(self.login_url.clone())
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn current_user(&self, credentials: &Credentials) -> Result<User, BackendError> {
        debug!(url = %self.me_url, "fetching current user");
        let response = self
            .client
            .get(self.me_url.clone())
            .header(AUTHORIZATION, credentials.authorization_header())
            .send()
            .await?;
        Self::decode(response).await
    }
}

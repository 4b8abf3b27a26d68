//! ---
//! fsm_section: "07-session-routing"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session ownership, credential persistence and route guarding."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use thiserror::Error;

/// Errors returned by the persisted credential store.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// Reading or writing the backing file failed.
    #[error("credential store io failure: {0}")]
    Io(#[from] std::io::Error),
    /// The stored document could not be decoded.
    #[error("credential store is corrupt: {0}")]
    Corrupt(String),
}

/// Errors returned by an authentication backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The endpoint answered `successful: false`.
    #[error("{message}")]
    Rejected { message: String },
    /// The credential was refused (HTTP 401/403 or unknown token).
    #[error("credential was not accepted")]
    Unauthorized,
    /// Non-2xx response, with the server message when one was sent.
    #[error("unexpected status {status}")]
    Status { status: u16, message: Option<String> },
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
    /// The configured base URL cannot address an endpoint.
    #[error("invalid endpoint {path}: {source}")]
    InvalidEndpoint {
        path: &'static str,
        #[source]
        source: url::ParseError,
    },
}

impl BackendError {
    /// Text suitable for display next to the login form.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Rejected { message } => message.clone(),
            BackendError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            BackendError::Unauthorized => "Invalid credentials".to_owned(),
            BackendError::Status { status, .. } => {
                format!("Login failed (server responded with status {status})")
            }
            BackendError::Transport(_) => "Unable to reach the authentication service".to_owned(),
            BackendError::Decode(_) => "Unexpected response from the authentication service".to_owned(),
            BackendError::InvalidEndpoint { .. } => {
                "The authentication service is misconfigured".to_owned()
            }
        }
    }
}

/// Errors surfaced by session transitions.
///
/// A failed silent restore is deliberately absent: it is an expected
/// steady-state condition reported through `RestoreOutcome`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, `successful: false`, or any failure while logging in.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Another login or restore is still pending.
    #[error("an authentication transition is already in flight")]
    TransitionInFlight,
    /// Login was requested while a user is signed in.
    #[error("a user is already authenticated")]
    AlreadyAuthenticated,
    /// A logout happened while this transition was pending; its result was discarded.
    #[error("authentication transition was superseded")]
    Superseded,
    /// The persisted credential could not be written or cleared.
    #[error(transparent)]
    CredentialStore(#[from] CredentialStoreError),
}

impl AuthError {
    /// Text to display inline to the operator.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Authentication(message) => message.clone(),
            AuthError::TransitionInFlight => "Sign-in already in progress".to_owned(),
            AuthError::AlreadyAuthenticated => "Already signed in".to_owned(),
            AuthError::Superseded => "Sign-in was cancelled".to_owned(),
            AuthError::CredentialStore(_) => "Unable to store the session credential".to_owned(),
        }
    }
}

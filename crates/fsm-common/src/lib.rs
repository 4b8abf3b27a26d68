//! ---
//! fsm_section: "01-core-functionality"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Shared configuration and tracing bootstrap."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
//! Shared primitives for the FSM console access workspace.
//! This crate exposes configuration loading and the tracing bootstrap
//! consumed by the session crate and the operator CLI.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, AuthConfig, CredentialsConfig, LoadedAppConfig, LoggingConfig, NavigationConfig,
};
pub use logging::{init_tracing, LogFormat};

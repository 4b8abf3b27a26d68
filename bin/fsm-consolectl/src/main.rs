//! ---
//! fsm_section: "05-networking-external-interfaces"
//! fsm_subsection: "binary"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Session CLI for operators of the FSM console."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fsm_common::{init_tracing, AppConfig};
use fsm_security::Action;
use fsm_session::RouteRequirement;

mod session;

const CONFIG_CANDIDATES: [&str; 2] = ["fsm-console.toml", "config/fsm-console.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "FSM console session utility",
    long_about = None
)]
struct Cli {
    /// Configuration file (overrides FSM_CONSOLE_CONFIG and the default candidates).
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Use the in-memory demo accounts instead of the REST endpoint.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    mock: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and persist the session credential.
    Login {
        #[arg(long, short = 'e')]
        email: String,
        #[arg(long, short = 'p', env = "FSM_CONSOLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session and clear the persisted credential.
    Logout,
    /// Show the restored user, roles and effective permissions.
    Whoami,
    /// Check a single permission for the restored user.
    Can {
        resource: String,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Run the route guard for a protected path.
    Open {
        path: String,
        /// Additional permission the route demands, as resource:action.
        #[arg(long, value_name = "RESOURCE:ACTION")]
        require: Option<RouteRequirement>,
    },
}

fn parse_action(value: &str) -> Result<Action, String> {
    value
        .parse()
        .map_err(|_| format!("unknown action '{value}' (read, write, delete, admin)"))
}

fn load_config(explicit: Option<&PathBuf>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::from_file(path);
    }
    let env_override = std::env::var(AppConfig::ENV_CONFIG_PATH)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if env_override || CONFIG_CANDIDATES.iter().any(|path| Path::new(path).exists()) {
        return AppConfig::load(&CONFIG_CANDIDATES);
    }
    Ok(AppConfig::default())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    if cli.mock {
        config.auth.mock = true;
    }
    init_tracing("fsm-consolectl", &config.logging)?;

    let console = session::Console::from_config(&config)?;
    match cli.command {
        Commands::Login { email, password } => console.login(&email, &password).await,
        Commands::Logout => console.logout().await,
        Commands::Whoami => console.whoami().await,
        Commands::Can { resource, action } => console.can(&resource, action).await,
        Commands::Open { path, require } => console.open(&path, require).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn open_accepts_requirement() {
        let cli = Cli::try_parse_from([
            "fsm-consolectl",
            "--mock",
            "open",
            "/finance",
            "--require",
            "finance-manager:write",
        ])
        .unwrap();
        assert!(cli.mock);
        match cli.command {
            Commands::Open { path, require } => {
                assert_eq!(path, "/finance");
                assert_eq!(require.unwrap().action, Action::Write);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn can_rejects_unknown_action() {
        assert!(Cli::try_parse_from(["fsm-consolectl", "can", "dashboard", "execute"]).is_err());
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");
        std::fs::write(&path, "[navigation]\nlanding_route = \"/jobs\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.navigation.landing_route, "/jobs");
    }
}

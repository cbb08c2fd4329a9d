//! CLI configuration: thin wrapper around `boardsync_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--server, --board, --token, --insecure, --timeout, --no-sync).

use std::time::Duration;

use secrecy::SecretString;

use boardsync_core::{EntityId, SessionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use boardsync_config::{
    Config, Profile, config_path, load_config, load_config_or_default, profile_to_session_config,
    save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `SessionConfig` for a board command.
///
/// Flags win over the profile. Without a matching profile, `--server`
/// and `--board` alone are enough.
pub fn resolve_session_config(
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<SessionConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut session = if let Some(profile) = cfg.profiles.get(&profile_name) {
        let mut profile = profile.clone();
        if let Some(ref server) = global.server {
            profile.server.clone_from(server);
        }
        if global.insecure {
            profile.insecure = Some(true);
        }
        if global.timeout.is_some() {
            profile.timeout = global.timeout;
        }
        profile_to_session_config(&profile, &profile_name, global.board.as_deref())?
    } else {
        from_flags(global, cfg, &profile_name)?
    };

    if let Some(ref token) = global.token {
        session.token = Some(SecretString::from(token.clone()));
    }
    session.sync_enabled = cfg.defaults.sync && !global.no_sync;
    Ok(session)
}

fn from_flags(
    global: &GlobalOpts,
    cfg: &Config,
    profile_name: &str,
) -> Result<SessionConfig, CliError> {
    if global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name.into(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    let url_str = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;

    let board = global
        .board
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| CliError::NoBoard {
            profile: profile_name.into(),
        })?;

    let mut session = SessionConfig::new(url, EntityId::from(board));
    session.tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    session.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    Ok(session)
}

//! Global-flag-aware wrappers over `alarmwire-config`.
//!
//! Flags and `ALARMWIRE_*` variables override the active profile before it
//! is translated into a `MonitorConfig`.

use secrecy::SecretString;

use alarmwire_config::{Config, Profile};
use alarmwire_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `MonitorConfig` from the config file, profile, and CLI overrides.
pub fn build_monitor_config(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let cfg = alarmwire_config::load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        // No profile: flags alone may still describe a server.
        None if global.has_endpoint() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: cfg.available_profiles(),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: alarmwire_config::config_path().display().to_string(),
            });
        }
    };
    apply_overrides(&mut profile, global);

    let mut config =
        alarmwire_config::profile_to_monitor_config(&profile, &profile_name, &cfg.defaults)?;
    if let Some(ref token) = global.token {
        config.token = Some(SecretString::from(token.clone()));
    }
    tracing::debug!(
        profile = %profile_name,
        tenant = ?config.tenant_id,
        authenticated = config.token.is_some(),
        "resolved monitor config"
    );
    Ok(config)
}

/// Flag > env > profile.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref origin) = global.origin {
        profile.origin = Some(origin.clone());
    }
    if let Some(ref api_url) = global.api_url {
        profile.api_url = Some(api_url.clone());
    }
    if let Some(ref push_url) = global.push_url {
        profile.push_url = Some(push_url.clone());
    }
    if global.tenant.is_some() {
        profile.tenant_id = global.tenant;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
}

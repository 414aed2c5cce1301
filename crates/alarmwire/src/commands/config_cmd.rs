//! Config subcommand handlers.

use alarmwire_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Map an interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn invalid(field: &str, reason: &str) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Apply `config set <key> <value>` to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "origin" => profile.origin = Some(value),
        "api_url" | "api-url" => profile.api_url = Some(value),
        "push_url" | "push-url" => profile.push_url = Some(value),
        "tenant_id" | "tenant-id" | "tenant" => {
            profile.tenant_id = Some(value.parse().map_err(|_| invalid("tenant_id", "must be an integer"))?);
        }
        "user_id" | "user-id" => profile.user_id = Some(value),
        "admin_channel" | "admin-channel" => {
            profile.admin_channel =
                Some(value.parse().map_err(|_| invalid("admin_channel", "must be 'true' or 'false'"))?);
        }
        "token" => profile.token = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "insecure" => {
            profile.insecure =
                Some(value.parse().map_err(|_| invalid("insecure", "must be 'true' or 'false'"))?);
        }
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "timeout" => {
            profile.timeout =
                Some(value.parse().map_err(|_| invalid("timeout", "must be a number (seconds)"))?);
        }
        "page_size" | "page-size" => {
            let size: u32 = value
                .parse()
                .map_err(|_| invalid("page_size", "must be a positive number"))?;
            if size == 0 {
                return Err(invalid("page_size", "must be at least 1"));
            }
            profile.page_size = Some(size);
        }
        "max_retries" | "max-retries" => {
            profile.max_retries =
                Some(value.parse().map_err(|_| invalid("max_retries", "must be a number"))?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: origin, api_url, push_url, \
                     tenant_id, user_id, admin_channel, token, token_env, insecure, ca_cert, \
                     timeout, page_size, max_retries"
                ),
            });
        }
    }
    Ok(())
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: cfg.available_profiles(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = alarmwire_config::load_config()?;
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n({e})")),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", alarmwire_config::config_path().display());
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = alarmwire_config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_key(profile, &key, value)?;

            let path = alarmwire_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Set {key} on profile '{profile_name}' ({})", path.display());
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = alarmwire_config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: alarmwire config set origin <url>");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = alarmwire_config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &cfg));
            }
            cfg.default_profile = Some(name.clone());
            alarmwire_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = alarmwire_config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }

            let token = rpassword::prompt_password("Bearer token: ").map_err(prompt_err)?;
            if token.trim().is_empty() {
                return Err(invalid("token", "value cannot be empty"));
            }
            alarmwire_config::store_token(&profile_name, token.trim())?;

            if !global.quiet {
                eprintln!("Token stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}

//! Config subcommand handlers. None of these touch the network.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

/// Format config for display, masking tokens.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "polling_interval = {}", cfg.defaults.polling_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "client = \"{}\"", p.client);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(interval) = p.polling_interval {
            let _ = writeln!(out, "polling_interval = {interval}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref api) = p.api_base {
            let _ = writeln!(out, "api_base = \"{api}\"");
        }
        if let Some(ref data) = p.data_base {
            let _ = writeln!(out, "data_base = \"{data}\"");
        }
    }

    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(format_config_redacted(&cfg).trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.profile_name(None);
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            let lines: Vec<String> = names
                .into_iter()
                .map(|name| {
                    if name == default {
                        format!("* {name}")
                    } else {
                        format!("  {name}")
                    }
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::AddProfile {
            name,
            client,
            token_env,
            polling_interval,
            default,
        } => {
            if polling_interval == Some(0) {
                return Err(CliError::Validation {
                    field: "polling-interval".into(),
                    reason: "must be greater than zero".into(),
                });
            }
            let mut cfg = config::load_config_or_default();
            let profile = cfg.profiles.entry(name.clone()).or_insert_with(Profile::default);
            profile.client = client.as_str().into();
            if token_env.is_some() {
                profile.token_env = token_env;
            }
            if polling_interval.is_some() {
                profile.polling_interval = polling_interval;
            }
            if default {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;
            tracing::info!(profile = %name, "profile saved");
            if !global.quiet {
                eprintln!("Saved profile '{name}' to {}", config::config_path().display());
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                available.sort();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available.join(", "),
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let cfg = config::load_config_or_default();
            let profile = config::active_profile_name(global, &cfg);
            if token.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "cannot be empty".into(),
                });
            }
            afero_config::store_token(&profile, token.trim())?;
            if !global.quiet {
                eprintln!("Token stored in the system keyring for profile '{profile}'");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_redacted() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                token: Some("super-secret".into()),
                token_env: Some("HUBSPACE_TOKEN".into()),
                ..Profile::default()
            },
        );
        let shown = format_config_redacted(&cfg);
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("token = \"****\""));
        assert!(shown.contains("token_env = \"HUBSPACE_TOKEN\""));
        assert!(shown.contains("[profiles.home]"));
    }
}

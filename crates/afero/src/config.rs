//! CLI configuration: thin wrapper around `afero_config` shared types.
//!
//! Adds the resolution that respects `GlobalOpts` flag overrides
//! (`--profile`, `--token`, `--client`, `--timeout`, `--interval`).

use std::time::Duration;

use secrecy::SecretString;

use afero_core::BridgeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use afero_config::{Config, Profile, config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Parse a human duration such as `"45s"` or `"2m"`.
pub fn parse_interval(raw: &str) -> Result<Duration, CliError> {
    let interval = humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: "interval".into(),
        reason: e.to_string(),
    })?;
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(interval)
}

/// Build the bridge configuration for this invocation.
///
/// Flags override the profile; a missing profile is only an error when
/// it was asked for by name; otherwise a token flag alone is enough.
/// Returns the resolved profile name alongside the config.
pub fn resolve_bridge_config(global: &GlobalOpts) -> Result<(BridgeConfig, String), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(client) = global.client {
        profile.client = client.as_str().into();
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => afero_config::resolve_token(&profile, &profile_name)?,
    };

    let mut config =
        afero_config::profile_to_bridge_config_with_token(&profile, &cfg.defaults, token)?;
    if let Some(ref raw) = global.interval {
        config.polling_interval = parse_interval(raw)?;
    }
    Ok((config, profile_name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn intervals_accept_humantime_units() {
        assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            parse_interval("0s"),
            Err(CliError::Validation { .. })
        ));
        assert!(parse_interval("soon").is_err());
    }
}

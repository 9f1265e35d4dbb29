//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod devices;
pub mod set;
pub mod watch;

use afero_core::Bridge;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a command that needs a live bridge.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let (bridge, profile) = connect(global).await?;

    let result = match cmd {
        Command::Devices(args) => devices::handle(&bridge, args, global),
        Command::Watch(args) => watch::handle(&bridge, args, global).await,
        Command::Set(args) => set::handle(&bridge, args, global).await,
        // Handled in `run` without a connection.
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };

    bridge.close().await;
    result.map_err(|e| e.with_profile(&profile))
}

/// Build a bridge from the resolved profile and run the first poll.
async fn connect(global: &GlobalOpts) -> Result<(Bridge, String), CliError> {
    let (bridge_config, profile) = config::resolve_bridge_config(global)?;
    tracing::debug!(
        profile = %profile,
        client = %bridge_config.client,
        interval = %humantime::format_duration(bridge_config.polling_interval),
        "connecting"
    );

    let bridge = Bridge::new(bridge_config).map_err(CliError::from)?;
    if let Err(e) = bridge.initialize().await {
        bridge.close().await;
        return Err(CliError::from(e).with_profile(&profile));
    }
    Ok((bridge, profile))
}

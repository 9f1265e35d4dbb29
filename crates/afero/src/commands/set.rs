//! Manual state writes.

use serde_json::Value;

use afero_core::{Bridge, StateEntry, UpdateOutcome};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

/// `"on"` stays a string, `50` becomes a number, `{"r":1}` an object.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub async fn handle(bridge: &Bridge, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.function_class.trim().is_empty() {
        return Err(CliError::Validation {
            field: "function-class".into(),
            reason: "cannot be empty".into(),
        });
    }

    let entry = StateEntry::new(args.function_class, parse_value(&args.value))
        .with_optional_instance(args.instance);

    let outcome = bridge.send_service_request(&args.device, vec![entry]).await?;
    tracing::info!(device_id = %args.device, %outcome, "write finished");

    match outcome {
        UpdateOutcome::RolledBack => Err(CliError::RolledBack {
            device_id: args.device,
        }),
        UpdateOutcome::Applied | UpdateOutcome::NoChange => {
            let device = bridge.get(&args.device)?;
            let out = output::render_single(
                &global.output,
                &device,
                |r| format!("{}  {}", r.id(), r.summary()),
                |r| r.id().to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

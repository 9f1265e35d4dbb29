//! Device listing.

use tabled::Tabled;

use afero_core::{AnyResource, Bridge};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&AnyResource> for DeviceRow {
    fn from(r: &AnyResource) -> Self {
        Self {
            id: r.id().to_owned(),
            name: r.info().name.clone(),
            category: r.kind().to_string(),
            model: r.info().model.clone(),
            state: r.summary(),
        }
    }
}

fn detail(r: &AnyResource) -> String {
    let info = r.info();
    [
        format!("ID:       {}", r.id()),
        format!("Name:     {}", info.name),
        format!("Category: {}", r.kind()),
        format!("Class:    {}", info.device_class),
        format!("Model:    {}", info.model),
        format!("Parent:   {}", info.parent_id.as_deref().unwrap_or("-")),
        format!("State:    {}", r.summary()),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(bridge: &Bridge, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(id) = args.id {
        let device = bridge.get(&id)?;
        let out = output::render_single(&global.output, &device, detail, |r| r.id().to_owned())?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let devices: Vec<AnyResource> = bridge
        .devices()
        .into_iter()
        .filter(|r| {
            args.category
                .is_none_or(|c| r.kind().to_string() == c.as_str())
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &devices,
        |r| DeviceRow::from(r),
        |r| r.id().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

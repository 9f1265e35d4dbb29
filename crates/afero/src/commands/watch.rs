//! Live event streaming.

use serde::Serialize;

use afero_core::{AnyResource, Bridge, Event, EventType};

use crate::cli::{CategoryArg, GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::devices;

#[derive(Serialize)]
struct Record<'a> {
    event: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<&'a AnyResource>,
}

/// Renders one streamed record per line (or per YAML document).
#[derive(Clone)]
struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn print(&self, event: EventType, resource: Option<&AnyResource>) {
        let record = Record { event, resource };
        let rendered = match self.format {
            OutputFormat::Table | OutputFormat::Plain => Ok(self.line(event, resource)),
            OutputFormat::Json | OutputFormat::JsonCompact => {
                output::render_structured(&OutputFormat::JsonCompact, &record)
            }
            OutputFormat::Yaml => output::render_structured(&OutputFormat::Yaml, &record)
                .map(|doc| format!("---\n{}", doc.trim_end())),
        };
        match rendered {
            Ok(line) => output::print_output(&line, self.quiet),
            Err(e) => tracing::warn!(error = %e, "dropping unrenderable event"),
        }
    }

    fn line(&self, event: EventType, resource: Option<&AnyResource>) -> String {
        let time = chrono::Local::now().format("%H:%M:%S");
        let label = output::event_label(event, self.color);
        match resource {
            Some(r) => format!(
                "{time} {label} {:<6} {}  {}  {}",
                r.kind(),
                r.id(),
                r.info().name,
                r.summary()
            ),
            None => format!("{time} {label}"),
        }
    }
}

fn wanted(category: Option<CategoryArg>, resource: &AnyResource) -> bool {
    category.is_none_or(|c| resource.kind().to_string() == c.as_str())
}

pub async fn handle(bridge: &Bridge, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.initial {
        devices::handle(
            bridge,
            crate::cli::DevicesArgs {
                category: args.category,
                id: None,
            },
            global,
        )?;
    }

    let printer = Printer {
        format: global.output.clone(),
        color: output::should_color(&global.color),
        quiet: global.quiet,
    };

    let category = args.category;
    let resources = {
        let printer = printer.clone();
        bridge.subscribe(move |event, resource| {
            if wanted(category, resource) {
                printer.print(event, Some(resource));
            }
        })
    };

    let control = bridge.events().subscribe(
        move |event: &Event| {
            if event.is_control_plane() {
                printer.print(event.event_type(), None);
            }
        },
        None,
    );

    tracing::info!(
        devices = bridge.tracked_devices().len(),
        interval = %humantime::format_duration(bridge.events().polling_interval()),
        "watching; press Ctrl-C to stop"
    );
    let waited = tokio::signal::ctrl_c().await;

    resources.unsubscribe();
    control.unsubscribe();
    waited?;
    Ok(())
}

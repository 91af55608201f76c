use anyhow::Context;
use clap::Parser;
use co2core::dataset::EmissionTable;
use co2core::telemetry::MetricsRecorder;
use gui_bridge::bridge::GuiBridge;
use gui_bridge::model::{ViewKind, ViewRequest};
use loader::load_records;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::DashboardConfig;
use workflow::runner::Runner;

mod gui_bridge;
mod loader;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "ASEAN CO2 emissions dashboard driver")]
struct Args {
    /// Load dashboard settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emissions CSV (overrides the config file)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Build one view and print it as JSON (forecast when --serve is absent)
    #[arg(long, value_enum)]
    view: Option<ViewKind>,
    /// Focus year for the map, line and bar views
    #[arg(long)]
    year: Option<i32>,
    /// Country for the forecast view, or "All countries"
    #[arg(long)]
    country: Option<String>,
    /// Comma-separated country filter for the line view
    #[arg(long, value_delimiter = ',')]
    countries: Vec<String>,
    #[arg(long)]
    future_year: Option<i32>,
    /// Keep the HTTP view bridge running until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        DashboardConfig::load(path)?
    } else {
        let defaults = DashboardConfig::default();
        DashboardConfig::from_args(
            args.data.clone().unwrap_or(defaults.data_path),
            args.year.unwrap_or(defaults.default_year),
            args.future_year.unwrap_or(defaults.future_year),
        )
    };
    if let Some(data) = args.data {
        config.data_path = data;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let records = load_records(&config.data_path)?;
    let runner = Arc::new(Runner::new(config, EmissionTable::new(records))?);

    if let Some(kind) = requested_view(args.view, args.serve) {
        let mut request = ViewRequest::new(kind);
        request.year = args.year;
        request.countries = args.countries;
        request.series = args.country;
        request.future_year = args.future_year;
        let model = runner.execute(&request)?;
        let rendered = serde_json::to_string_pretty(&model).context("serializing view model")?;
        println!("{}", rendered);
    }

    if args.serve {
        let metrics = Arc::new(MetricsRecorder::new());
        let bridge = GuiBridge::new(runner.clone(), metrics);
        bridge.spawn(runner.config().bind_address);
        println!(
            "View bridge running on {} (Ctrl+C to stop)...",
            runner.config().bind_address
        );
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

/// A bare invocation prints the forecast view rather than nothing.
fn requested_view(view: Option<ViewKind>, serve: bool) -> Option<ViewKind> {
    match view {
        Some(kind) => Some(kind),
        None if !serve => {
            info!("no --view or --serve given, printing the forecast view");
            Some(ViewKind::Forecast)
        }
        None => None,
    }
}

// Command line entry point - open a dashboard and report what loaded
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dashboard_engine::application::remote::DashboardLookup;
use dashboard_engine::application::session::{DashboardSession, LoadedData, SessionDeps};
use dashboard_engine::infrastructure::config::load_engine_config;
use dashboard_engine::infrastructure::http_api::HttpApi;
use dashboard_engine::infrastructure::location::MemoryLocation;
use dashboard_engine::infrastructure::notifier::TracingNotifier;

/// Open a dashboard through the HTTP API and log what loaded.
#[derive(Debug, Parser)]
#[command(name = "dashboard-engine")]
struct Args {
    /// Dashboard slug, as it appears in the dashboard URL
    slug: String,

    /// Force a fresh execution of every widget query after opening
    #[arg(long)]
    refresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = load_engine_config().context("Failed to load engine configuration")?;
    let api = Arc::new(HttpApi::new(
        &config.api.base_url,
        config.api.api_key.clone(),
        std::time::Duration::from_millis(config.api.poll_interval_ms),
    ));
    let deps = SessionDeps {
        dashboards: api.clone(),
        widgets: api.clone(),
        queries: api,
        location: Arc::new(MemoryLocation::new(false)),
        notifier: Arc::new(TracingNotifier),
    };

    let session = DashboardSession::open(&DashboardLookup::Slug(args.slug), deps, config.session_settings())
        .await
        .context("Failed to open dashboard")?;

    if args.refresh {
        if let Some(report) = session.refresh_dashboard(&[]).await {
            tracing::info!(loaded = report.loaded.len(), failed = report.failed.len(), "dashboard refreshed");
        }
    }

    let dashboard = session.snapshot();
    tracing::info!(
        dashboard_id = dashboard.id,
        name = %dashboard.name,
        version = dashboard.version,
        widgets = dashboard.widgets.len(),
        can_edit = session.can_edit_dashboard(),
        "dashboard loaded"
    );
    for widget in &dashboard.widgets {
        let Some(id) = widget.id else { continue };
        let position = widget.position();
        let state = match session.widget_load(id).and_then(|load| load.data) {
            Some(LoadedData::Rows(result)) => format!("{} rows", result.rows.len()),
            Some(LoadedData::Error(message)) => format!("error: {}", message),
            None => "not loaded".to_string(),
        };
        tracing::info!(
            widget_id = %id,
            name = %widget.name(),
            col = position.col,
            row = position.row,
            size_x = position.size_x,
            size_y = position.size_y,
            auto_height = position.auto_height,
            "{}",
            state
        );
    }
    for parameter in session.global_parameters() {
        tracing::info!(name = %parameter.name, title = %parameter.title, value = %parameter.value, "global parameter");
    }
    for filter in session.filters() {
        tracing::info!(name = %filter.friendly_name, values = filter.values.len(), multiple = filter.multiple, "dashboard filter");
    }

    Ok(())
}

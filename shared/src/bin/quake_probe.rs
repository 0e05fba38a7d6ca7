use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use geojson::FeatureCollection;
use quakeview_core::{
    feature_property_rows, CancellationReason, ControllerEvent, DatasetPresenter, HttpFetcher,
    LoadResult, OrchestratorConfig, Query, RequestController, ResourceKind, TimeRange,
    DEFAULT_CUSTOM_RANGE_DAYS,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Query the USGS earthquake services through the map's request controller")]
struct Args {
    /// JSON controller configuration (defaults to the USGS endpoints)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of events whose properties are printed
    #[arg(long, default_value_t = 5)]
    show: usize,

    /// Answer the slow-request notice with "keep waiting" instead of cancelling
    #[arg(long)]
    keep_waiting: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Past seven days from the summary feed
    Recent,

    /// Custom window from the event query service
    Range {
        /// Start of the window (RFC 3339, e.g. 2024-01-01T00:00:00Z)
        #[arg(long, requires = "end")]
        start: Option<DateTime<Utc>>,

        /// End of the window (RFC 3339); must not be in the future
        #[arg(long, requires = "start")]
        end: Option<DateTime<Utc>>,

        /// Without --start/--end, the window reaching this many days back
        #[arg(long, default_value_t = DEFAULT_CUSTOM_RANGE_DAYS, conflicts_with = "start")]
        days: u32,
    },
}

/// Prints what the map would draw.
struct ConsolePresenter {
    show: usize,
}

impl DatasetPresenter for ConsolePresenter {
    fn present(&self, resource_kind: &ResourceKind, features: &FeatureCollection) {
        println!("{resource_kind}: {} features", features.features.len());
        for feature in features.features.iter().take(self.show) {
            println!("---");
            for row in feature_property_rows(feature) {
                println!("{:>12}  {}", row.key, row.value);
            }
        }
    }

    fn hide(&self, resource_kind: &ResourceKind) {
        println!("{resource_kind}: hidden");
    }

    fn show_empty(&self, resource_kind: &ResourceKind) {
        println!("{resource_kind}: no earthquakes found for this query");
    }
}

fn report(
    controller: &RequestController<HttpFetcher>,
    kind: &ResourceKind,
    event: &ControllerEvent,
    keep_waiting: bool,
) {
    match event {
        ControllerEvent::Warned { .. } if keep_waiting => {
            println!("Taking longer than expected; continuing to wait.");
            controller.continue_waiting(kind);
        }
        ControllerEvent::Warned { .. } => {
            println!("Taking longer than expected; cancelling.");
            controller.cancel_current(kind, CancellationReason::User);
        }
        other => {
            if let Some(message) = other.user_message() {
                eprintln!("{message}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => OrchestratorConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => OrchestratorConfig::default(),
    };

    let kind = ResourceKind::seismicity();
    let query = match args.command {
        Command::Recent => Query::recent(kind.clone()),
        Command::Range { start, end, days } => {
            let now = Utc::now();
            let range = match (start, end) {
                (Some(start), Some(end)) => TimeRange::new(start, end, now)?,
                _ => TimeRange::trailing_days(days, now)?,
            };
            info!(
                start = %range.start(),
                end = %range.end(),
                span_days = range.span().num_days(),
                "custom range"
            );
            Query::custom(kind.clone(), range)
        }
    };

    let presenter = Arc::new(ConsolePresenter { show: args.show });
    let (controller, mut events) = RequestController::new(HttpFetcher::new()?, presenter, config)?;

    let handle = controller.submit(query)?;
    info!(generation = %handle.generation(), request_id = %handle.request_id(), "query started");

    let outcome = handle.outcome();
    tokio::pin!(outcome);
    let result = loop {
        tokio::select! {
            result = &mut outcome => break result?,
            Some(event) = events.recv() => report(&controller, &kind, &event, args.keep_waiting),
        }
    };

    while let Ok(event) = events.try_recv() {
        report(&controller, &kind, &event, args.keep_waiting);
    }

    match result {
        LoadResult::Success(_) | LoadResult::EmptyResult => Ok(()),
        LoadResult::Failure(failure) => {
            warn!(category = %failure.category, status = ?failure.status, "query failed");
            Err(failure.to_string().into())
        }
        LoadResult::Cancelled(reason) => Err(format!("query cancelled ({reason:?})").into()),
        LoadResult::Superseded => Err("query superseded".into()),
    }
}

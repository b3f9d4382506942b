mod app;
mod story;
mod util;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph document (JSON). The built-in demo story is shown when omitted.
    #[arg(long)]
    graph: Option<PathBuf>,
    /// Deliver the document one node at a time at this interval.
    #[arg(long, value_name = "MS")]
    reveal_interval_ms: Option<u64>,
    /// Leave dragged nodes pinned where they are dropped.
    #[arg(long)]
    keep_pinned_on_release: bool,
    #[arg(long, allow_negative_numbers = true)]
    charge: Option<f32>,
    #[arg(long)]
    link_distance: Option<f32>,
    /// Seed for new-node placement, for reproducible layouts.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> eframe::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .init();

    let launch = app::LaunchOptions {
        source: args.graph,
        reveal_interval: args.reveal_interval_ms.map(Duration::from_millis),
        keep_pinned_on_release: args.keep_pinned_on_release,
        charge: args.charge,
        link_distance: args.link_distance,
        seed: args.seed,
    };
    info!(source = ?launch.source, "starting story-graph");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "story-graph",
        options,
        Box::new(move |cc| Ok(Box::new(app::StoryGraphApp::new(cc, launch)))),
    )
}

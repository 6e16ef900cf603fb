use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sus_report::config::{AnalysisConfig, BandChoice, Setup};
use sus_report::pipeline::{self, Collaborators, RequestContext};
use sus_report::render::RasterRenderer;
use sus_report::summary::{ChatCompletionsClient, SummaryProvider};
use sus_report::{ingest, report};

#[derive(Parser)]
#[command(name = "sus-report")]
#[command(about = "System Usability Scale scoring and report generator", long_about = None)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log everything, including per-chart decisions
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BandsArg {
    /// 0/25/39/52/73/86/100
    SixZone,
    /// 0/25/51/68/80/84/100
    Bangor,
}

impl From<BandsArg> for BandChoice {
    fn from(value: BandsArg) -> Self {
        match value {
            BandsArg::SixZone => BandChoice::SixZone,
            BandsArg::Bangor => BandChoice::Bangor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score a CSV file and print statistics, bands and category breakdowns
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        bands: Option<BandsArg>,
    },
    /// Build the full report bundle (page description, markdown, charts)
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "sus-report")]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        bands: Option<BandsArg>,
        /// Ask the text-generation service for a written analysis
        #[arg(long)]
        summary: bool,
    },
    /// Print the band table of a scheme
    Bands {
        #[arg(long, value_enum)]
        bands: Option<BandsArg>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_setup(config: Option<&Path>, bands: Option<BandsArg>) -> anyhow::Result<Setup> {
    let mut analysis = match config {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(bands) = bands {
        analysis = analysis.with_bands(bands.into());
    }
    analysis.validate().context("invalid configuration")
}

fn summary_provider(setup: &Setup, requested: bool) -> Option<Box<dyn SummaryProvider>> {
    let config = &setup.config.summary;
    if !(requested || config.enabled) {
        return None;
    }
    match ChatCompletionsClient::from_config(config) {
        Ok(client) => Some(Box::new(client)),
        Err(err) => {
            warn!(error = %err, "written analysis disabled");
            None
        }
    }
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter_layer = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::new("info")
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    pipeline::block_on_with_grace(run(cli.command), SHUTDOWN_GRACE)
        .context("failed to start async runtime")?
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Analyze {
            input,
            config,
            bands,
        } => {
            let setup = load_setup(config.as_deref(), bands)?;
            let dataset = ingest::read_path(&input, &setup.config)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let analysis =
                pipeline::analyze(&dataset.responses, &dataset.attribute_names(), &setup)?;
            print!(
                "{}",
                report::render_analysis(&analysis, setup.config.language.labels())
            );
        }
        Commands::Report {
            input,
            out,
            config,
            bands,
            summary,
        } => {
            let setup = load_setup(config.as_deref(), bands)?;
            let dataset = ingest::read_path(&input, &setup.config)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let context = RequestContext::from_dataset(&setup, &dataset);
            let collaborators = Collaborators {
                renderer: Arc::new(RasterRenderer::default()),
                summary: summary_provider(&setup, summary),
            };

            let output = pipeline::generate_report(&context, &collaborators).await?;
            let bundle = report::write_bundle(&output, setup.config.language.labels(), &out)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!(
                "Report written to {} ({} pages, {} charts).",
                out.display(),
                output.document.pages.len(),
                bundle.charts.len()
            );
        }
        Commands::Bands { bands, config } => {
            let setup = load_setup(config.as_deref(), bands)?;
            println!("Band scheme: {}", setup.bands.name);
            for band in setup.bands.bands() {
                println!("- {} {} ({})", band.range_label(), band.label, band.color);
            }
        }
    }

    Ok(())
}

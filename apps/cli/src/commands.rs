//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use eventfeed_core::{PipelineDeps, ProgressReporter, RunReport, plan_queries, refresh_events};
use eventfeed_server::AppState;
use eventfeed_shared::{
    AppConfig, EventFeedError, SourceLabel, init_config, load_config, load_config_from, resolve_api_keys,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// EventFeed: upcoming Taiwanese events as a static JSON feed.
#[derive(Parser)]
#[command(
    name = "eventfeed",
    version,
    about = "Collect upcoming local events from ticketing sites into a static JSON feed.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.eventfeed/eventfeed.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline once and publish the events file.
    Refresh {
        /// Output file (defaults to [output] path from config).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Plan as if today were this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Serve the on-demand HTTP endpoint.
    Serve {
        /// Address to bind (defaults to [server] bind from config).
        #[arg(long)]
        bind: Option<String>,

        /// Pin the planning date for every request (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print the search window and keywords without searching.
    Plan {
        /// Plan as if today were this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Targets whose events are shown by default.
const CRATES: [&str; 7] = [
    "eventfeed",
    "eventfeed_shared",
    "eventfeed_search",
    "eventfeed_extraction",
    "eventfeed_core",
    "eventfeed_server",
    "tower_http",
];

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Refresh { output, date } => {
            cmd_refresh(load(config_path.as_deref())?, output, date).await
        }
        Command::Serve { bind, date } => cmd_serve(load(config_path.as_deref())?, bind, date).await,
        Command::Plan { date } => cmd_plan(date),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&load(config_path.as_deref())?),
        },
    }
}

/// Load the `--config` file, or the default location.
fn load(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config_from(path)
            .wrap_err_with(|| format!("loading config from {}", path.display())),
        None => Ok(load_config()?),
    }
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_refresh(mut config: AppConfig, output: Option<PathBuf>, date: Option<NaiveDate>) -> Result<()> {
    // Keys first: nothing runs without both of them.
    let keys = resolve_api_keys(&config)?;

    if let Some(output) = output {
        config.output.path = output;
    }
    let today = today_or(date);

    info!(%today, output = %config.output.path.display(), "refreshing events");

    let deps = PipelineDeps::from_config(config, &keys)?;
    let reporter = CliProgress::new();
    let report = refresh_events(&deps, today, &reporter).await?;

    print_summary(&report);
    Ok(())
}

async fn cmd_serve(config: AppConfig, bind: Option<String>, date: Option<NaiveDate>) -> Result<()> {
    let keys = resolve_api_keys(&config)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let deps = PipelineDeps::from_config(config, &keys)?;
    let mut state = AppState::new(deps);
    if let Some(date) = date {
        state = state.with_today(date);
    }

    println!("Listening on http://{bind}");
    eventfeed_server::serve(state, &bind).await?;
    Ok(())
}

fn cmd_plan(date: Option<NaiveDate>) -> Result<()> {
    let plan = plan_queries(today_or(date));
    println!("Window:   {} - {}", plan.start_label(), plan.end_label());
    println!("Keywords: {}", plan.keywords);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    println!("  Events refreshed.");
    println!("  Run:     {}", report.run_id);
    println!(
        "  Window:  {} - {}",
        report.window_start.format("%Y/%m/%d"),
        report.window_end.format("%Y/%m/%d")
    );
    println!("  Hits:    {} ({} unique)", report.raw_hits, report.unique_hits);
    if !report.failed_sources.is_empty() {
        let failed: Vec<&str> = report.failed_sources.iter().map(SourceLabel::as_str).collect();
        println!("  Failed:  {}", failed.join(", "));
    }
    println!("  Events:  {} (extracted {})", report.events, report.extracted);
    println!("  Tokens:  {} in / {} out", report.tokens_in, report.tokens_out);
    if let Some(published) = &report.published {
        println!("  Path:    {}", published.path.display());
        println!("  SHA-256: {}", published.sha256);
    }
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_searched(&self, label: SourceLabel, hits: usize, failed: bool) {
        if failed {
            self.spinner.println(format!("  ! {label}: search failed, skipped"));
        } else {
            self.spinner.println(format!("  {label}: {hits} hits"));
        }
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }

    fn failed(&self, _error: &EventFeedError) {
        self.spinner.finish_and_clear();
    }
}

use catalog_sitemap::config::{self, Overrides};
use catalog_sitemap::output;
use catalog_sitemap::pipeline::SitemapOrchestrator;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "catalog-sitemap")]
#[command(about = "Sitemap generator for a statically rendered model catalog")]
#[command(long_about = "\
Sitemap generator for a statically rendered model catalog

Reads the rendered site and the catalog it was rendered from, and writes a
sitemaps.org XML sitemap plus a JSON run report.

Inputs:

  site/
  ├── index.html                   # Home page (date only; URL always emitted)
  ├── models/                      # Item pages, one per catalog row
  │   └── llama-2-7b-chat.html
  ├── guides/                      # Guide pages
  └── categories/                  # Category pages
  data/
  └── catalog.json                 # [{\"modelName\": \"Llama 2 7B Chat\"}, ...]

Outputs (in --output):
  sitemap.xml                      # Single <urlset>, or the first chunk
  sitemap-N.xml                    # Further chunks past 50,000 URLs or 50 MiB
  sitemap-index.xml                # <sitemapindex>, chunked runs only
  sitemap-report.json              # Counts, duplicates, warnings, digests

Set RUST_LOG to control log verbosity (default: info).

Run 'catalog-sitemap gen-config' to generate a documented sitemap.toml.")]
#[command(version)]
struct Cli {
    /// Config file; stock defaults apply when it does not exist
    #[arg(long, default_value = "sitemap.toml", global = true)]
    config: PathBuf,

    /// Rendered site directory
    #[arg(long, global = true)]
    site_root: Option<PathBuf>,

    /// Catalog JSON file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Output directory for sitemap documents and the report
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Absolute HTTPS base URL of the published site
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Run date (YYYY-MM-DD) used for missing last-modified dates
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and write the sitemap and report
    Build,
    /// Run every stage and validate the result without writing anything
    Check,
    /// Print a stock sitemap.toml with all options documented
    GenConfig,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            site_root: self.site_root.clone(),
            catalog: self.catalog.clone(),
            output_dir: self.output.clone(),
            base_url: self.base_url.clone(),
            today: self.today,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build => {
            let orchestrator = orchestrator(&cli)?;
            println!(
                "==> Building sitemap from {}",
                orchestrator.config().site_root.display()
            );
            let outcome = orchestrator.run()?;
            output::print_run_output(&outcome.report);
            println!(
                "==> Build complete: {}",
                orchestrator.config().output.dir.display()
            );
        }
        Command::Check => {
            let orchestrator = orchestrator(&cli)?;
            println!(
                "==> Checking {}",
                orchestrator.config().site_root.display()
            );
            let outcome = orchestrator.check()?;
            output::print_run_output(&outcome.report);
            println!("==> Sitemap is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn orchestrator(cli: &Cli) -> Result<SitemapOrchestrator, Box<dyn std::error::Error>> {
    init_tracing(cli.log_json);
    let config = config::load_config(&cli.config, cli.overrides())?;
    Ok(SitemapOrchestrator::new(config)?)
}

/// Structured logs on stderr; stdout carries the run summary.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

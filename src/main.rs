use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use catalog_scraper::{
    orchestrator, CsvExporter, Exporter, HttpFetcher, Paginator, ScrapeConfig, SelectorSet,
    SheetsExporter,
};

#[derive(Parser, Debug)]
#[command(name = "catalog-scraper")]
#[command(about = "Scrape product titles and brands from category listing pages into a spreadsheet")]
#[command(version)]
struct Args {
    /// File with one category URL per line ('#' lines are comments)
    urls_file: PathBuf,

    /// JSON file with the site's selectors and scraper settings
    #[arg(short, long, default_value = "scraper.json")]
    config: PathBuf,

    /// Google Sheets spreadsheet id to append rows to
    /// (requires SHEETS_API_TOKEN in the environment or a .env file)
    #[arg(long, conflicts_with = "csv")]
    sheet_id: Option<String>,

    /// Worksheet (tab) name within the spreadsheet
    #[arg(long, default_value = "Scraped Products")]
    worksheet: String,

    /// Write rows to a local CSV file instead of Google Sheets
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Override the per-category page limit from the config
    #[arg(long)]
    max_pages: Option<u32>,
}

fn main() -> ExitCode {
    env_logger::init();
    dotenv::dotenv().ok();

    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = ScrapeConfig::from_file(&args.config)?;
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }

    let selectors = SelectorSet::compile(&config.selectors)?;
    let targets = config.load_targets(&args.urls_file)?;
    if targets.is_empty() {
        return Err(format!("no category URLs found in {}", args.urls_file.display()).into());
    }

    let mut exporter: Box<dyn Exporter> = match (&args.csv, &args.sheet_id) {
        (Some(path), _) => Box::new(CsvExporter::create(path, config.dedupe)?),
        (None, Some(sheet_id)) => Box::new(SheetsExporter::from_env(
            sheet_id,
            &args.worksheet,
            config.dedupe,
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )?),
        (None, None) => {
            return Err("no destination: pass --sheet-id <id> or --csv <path>".into());
        }
    };

    let fetcher = HttpFetcher::new(
        Duration::from_secs(config.timeout_secs),
        config.max_retries,
        Duration::from_millis(config.retry_delay_ms),
    )?;
    let paginator = Paginator::new(
        &fetcher,
        &selectors,
        config.max_pages,
        Duration::from_millis(config.page_delay_ms),
    );

    println!("Catalog Scraper");
    println!("===============\n");
    println!("Processing {} category target(s)...\n", targets.len());

    let summary = orchestrator::run(
        &targets,
        &paginator,
        exporter.as_mut(),
        Duration::from_millis(config.category_delay_ms),
    )?;

    println!("\nRun summary");
    println!("-----------");
    println!("  Targets processed: {}", summary.targets_processed);
    println!("  Records exported:  {}", summary.records_exported);
    println!("  Targets failed:    {}", summary.targets_failed);

    if !summary.failures.is_empty() {
        println!("\nFailed categories:");
        for failure in &summary.failures {
            println!(
                "  ✗ {} (page {}): {}",
                failure.url, failure.page_number, failure.reason
            );
        }
    } else {
        println!("\n✓ All categories scraped successfully");
    }

    Ok(summary.all_succeeded())
}

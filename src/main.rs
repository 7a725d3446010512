mod assets;
mod browser;
mod crawl;
mod db;
mod enrich;
mod model;
mod ocr;
mod options;
mod parser;
mod reconcile;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use browser::{http_client, HttpBrowser};
use options::{Options, OptionsError, Overrides};
use reconcile::Reconciler;

#[derive(Parser)]
#[command(
    name = "sil_scraper",
    about = "Harvest legislative initiatives from the SIL portal into a local store"
)]
struct Cli {
    /// INI file with option sections
    #[arg(long, global = true, default_value = options::DEFAULT_CONFIG_FILE)]
    config_filename: PathBuf,
    /// Section of the config file to use
    #[arg(long, global = true, default_value = options::DEFAULT_SECTION)]
    config_section: String,
    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print stored records presented within a range of years
    ListRecords {
        #[arg(long)]
        database_filename: Option<PathBuf>,
        /// Initial year (inclusive)
        #[arg(long)]
        ini_year: Option<i32>,
        /// Final year (inclusive)
        #[arg(long)]
        fin_year: Option<i32>,
    },
    /// Run the search on the portal and reconcile every result into the store
    Query {
        #[arg(long)]
        database_filename: Option<PathBuf>,
        /// Free-text query
        #[arg(long)]
        query: Option<String>,
        /// Legislative session label, e.g. "LXIV"
        #[arg(long)]
        legislation: Option<String>,
        /// Document type label, e.g. "Iniciativa"
        #[arg(long)]
        document_type: Option<String>,
        /// Write results into the store (default)
        #[arg(long, overrides_with = "dont_save_into_db")]
        save_into_db: bool,
        /// Only report what would be inserted or updated
        #[arg(long)]
        dont_save_into_db: bool,
        /// Delete every stored record before crawling
        #[arg(long)]
        purge: bool,
    },
    /// Visit each record's subject page and store its detail table
    FillSubjectInfo {
        #[arg(long)]
        database_filename: Option<PathBuf>,
    },
    /// Download each record's attached document and extract its text
    Download {
        #[arg(long)]
        database_filename: Option<PathBuf>,
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
}

impl Commands {
    fn overrides(&self) -> Overrides {
        match self {
            Commands::ListRecords {
                database_filename, ..
            }
            | Commands::FillSubjectInfo { database_filename } => Overrides {
                database_filename: database_filename.clone(),
                ..Default::default()
            },
            Commands::Query {
                database_filename,
                query,
                legislation,
                document_type,
                save_into_db,
                dont_save_into_db,
                purge,
            } => Overrides {
                database_filename: database_filename.clone(),
                query: query.clone(),
                legislation: legislation.clone(),
                document_type: document_type.clone(),
                save_into_db: if *dont_save_into_db {
                    Some(false)
                } else if *save_into_db {
                    Some(true)
                } else {
                    None
                },
                purge: purge.then_some(true),
                ..Default::default()
            },
            Commands::Download {
                database_filename,
                download_dir,
            } => Overrides {
                database_filename: database_filename.clone(),
                download_dir: download_dir.clone(),
                ..Default::default()
            },
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let opts = match options::load(&cli.config_filename, &cli.config_section) {
        Ok(o) => o,
        Err(e @ OptionsError::MissingSection { .. }) => {
            eprintln!("Error {}", e);
            return ExitCode::from(options::MISSING_SECTION_EXIT);
        }
        Err(e) => {
            eprintln!("Error: {:?}", anyhow::Error::from(e));
            return ExitCode::FAILURE;
        }
    };
    let mut overrides = cli.command.overrides();
    if cli.verbose {
        overrides.verbose = Some(true);
    }
    let opts = opts.with_overrides(overrides);

    init_tracing(opts.verbose);
    if cli.config_filename.exists() {
        info!("Reading config file from: {}", cli.config_filename.display());
    } else {
        warn!(
            "'{}' not found; using default config",
            cli.config_filename.display()
        );
    }

    let t0 = Instant::now();
    let result = run(&cli.command, &opts);

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Commands, opts: &Options) -> Result<()> {
    let conn = db::connect(&opts.database_filename)?;
    db::init_schema(&conn)?;
    info!("Loading store: {}", opts.database_filename.display());

    match command {
        Commands::ListRecords {
            ini_year, fin_year, ..
        } => {
            for stored in db::fetch_in_year_range(&conn, *ini_year, *fin_year)? {
                println!("{}", serde_json::to_string(&stored.record)?);
            }
            println!("Total: {}", db::count(&conn)?);
        }
        Commands::Query { .. } => {
            if !opts.save_into_db {
                info!("Dry run: nothing will be written");
            }
            let mut reconciler = Reconciler::new(&conn, opts.save_into_db);
            if opts.purge {
                reconciler.purge()?;
            }

            let mut browser = HttpBrowser::new(http_client()?);
            let first = crawl::open_search(&mut browser, opts)?;

            let mut pages = crawl::Pages::new(&mut browser, first);
            for page in pages.by_ref() {
                for record in page? {
                    reconciler.reconcile(record)?;
                }
            }

            println!("Result pages visited: {}", pages.visited());
            println!("Total records inserted: {}", reconciler.inserted());
            println!("Total records updated: {}", reconciler.updated());
        }
        Commands::FillSubjectInfo { .. } => {
            let mut browser = HttpBrowser::new(http_client()?);
            let stats = enrich::fill_subject_info(&conn, &mut browser)?;
            println!(
                "Filled subject info for {} of {} records ({} without subject link).",
                stats.filled, stats.total, stats.skipped
            );
        }
        Commands::Download { .. } => {
            let client = http_client()?;
            let stats =
                assets::download_assets(&conn, &opts.download_dir, &client, &ocr::Tesseract::default())?;
            println!(
                "Downloaded {} documents, extracted {} texts, updated {} records ({} without document).",
                stats.downloaded, stats.extracted, stats.refreshed, stats.ineligible
            );
        }
    }
    Ok(())
}

pub(crate) fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

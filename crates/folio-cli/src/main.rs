#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use folio_core::{
    parse_reference_date, read_json_document, validate_allocation, validate_holdings,
    validate_report, validate_research, Allocation, AllocationRequest, AnchorReference,
    ReviewType, Settings, ThesisCatalog, Verdict, Watchlist, DEFAULT_STALENESS_THRESHOLD_DAYS,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Validate portfolio workflow artifacts", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a proposed allocation against settings and watchlist
    Allocation {
        #[arg(long)]
        settings: PathBuf,
        #[arg(long)]
        watchlist: PathBuf,
        /// Allocation as inline JSON
        #[arg(long)]
        allocations: String,
        /// Previous allocation as inline JSON
        #[arg(long)]
        previous_allocations: Option<String>,
        /// KRW valuation of current holdings as inline JSON
        #[arg(long)]
        current_holdings: Option<String>,
        #[arg(long, value_enum, default_value_t = ReviewTypeArg::Monthly)]
        review_type: ReviewTypeArg,
    },
    /// Check a holdings snapshot
    Holdings {
        holdings_path: PathBuf,
        watchlist_path: PathBuf,
        /// Settings file providing holdings_staleness_threshold_days
        #[arg(long)]
        settings: Option<PathBuf>,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        reference_date: Option<String>,
    },
    /// Check a markdown analysis report
    Report {
        report_path: PathBuf,
        /// Require the action directives section
        #[arg(long, default_value_t = false)]
        has_holdings: bool,
    },
    /// Check thesis-check and candidates research artifacts
    Research {
        #[arg(long)]
        thesis_check: PathBuf,
        #[arg(long)]
        candidates: PathBuf,
        #[arg(long)]
        theses: PathBuf,
        #[arg(long)]
        watchlist: PathBuf,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        reference_date: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReviewTypeArg {
    Monthly,
    Quarterly,
}

impl From<ReviewTypeArg> for ReviewType {
    fn from(arg: ReviewTypeArg) -> Self {
        match arg {
            ReviewTypeArg::Monthly => ReviewType::Monthly,
            ReviewTypeArg::Quarterly => ReviewType::Quarterly,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(error = ?err, "Validation aborted");
            eprintln!("{}", json!({"status": "ERROR", "detail": format!("{:#}", err)}));
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<String> {
    let verdict = match command {
        Commands::Allocation {
            settings,
            watchlist,
            allocations,
            previous_allocations,
            current_holdings,
            review_type,
        } => run_allocation(
            &settings,
            &watchlist,
            &allocations,
            previous_allocations.as_deref(),
            current_holdings.as_deref(),
            review_type.into(),
        )?,
        Commands::Holdings {
            holdings_path,
            watchlist_path,
            settings,
            reference_date,
        } => run_holdings(
            &holdings_path,
            &watchlist_path,
            settings.as_deref(),
            reference_date.as_deref(),
        )?,
        Commands::Report {
            report_path,
            has_holdings,
        } => {
            let content = fs::read_to_string(&report_path)
                .with_context(|| format!("Failed to read report {}", report_path.display()))?;
            validate_report(&content, has_holdings)
        }
        Commands::Research {
            thesis_check,
            candidates,
            theses,
            watchlist,
            reference_date,
        } => run_research(
            &thesis_check,
            &candidates,
            &theses,
            &watchlist,
            reference_date.as_deref(),
        )?,
    };

    tracing::info!(status = %verdict.status, errors = verdict.errors.len(), warnings = verdict.warnings.len(), "Verdict");
    Ok(serde_json::to_string(&verdict)?)
}

fn run_allocation(
    settings_path: &Path,
    watchlist_path: &Path,
    allocations: &str,
    previous: Option<&str>,
    current_holdings: Option<&str>,
    review_type: ReviewType,
) -> Result<Verdict> {
    let settings = load_settings(settings_path)?;
    let watchlist = load_watchlist(watchlist_path)?;

    let allocation: Allocation =
        serde_json::from_str(allocations).context("Invalid --allocations JSON")?;
    let previous: Option<AnchorReference> = previous
        .map(serde_json::from_str)
        .transpose()
        .context("Invalid --previous-allocations JSON")?;
    let current_holdings: Option<AnchorReference> = current_holdings
        .map(serde_json::from_str)
        .transpose()
        .context("Invalid --current-holdings JSON")?;

    let mut request =
        AllocationRequest::new(&allocation, &watchlist, &settings).with_review_type(review_type);
    if let Some(previous) = previous.as_ref() {
        request = request.with_previous(previous);
    }
    if let Some(holdings) = current_holdings.as_ref() {
        request = request.with_current_holdings(holdings);
    }

    Ok(validate_allocation(&request))
}

fn run_holdings(
    holdings_path: &Path,
    watchlist_path: &Path,
    settings_path: Option<&Path>,
    reference_date: Option<&str>,
) -> Result<Verdict> {
    let holdings = read_json_document(holdings_path)
        .with_context(|| format!("Failed to load holdings {}", holdings_path.display()))?;
    let watchlist = load_watchlist(watchlist_path)?;

    let threshold = match settings_path {
        Some(path) => load_settings(path)?
            .holdings_staleness_threshold_days
            .unwrap_or(DEFAULT_STALENESS_THRESHOLD_DAYS),
        None => DEFAULT_STALENESS_THRESHOLD_DAYS,
    };
    let reference = resolve_reference_date(reference_date)?;

    Ok(validate_holdings(
        &holdings,
        &watchlist,
        Some(reference),
        threshold,
    ))
}

fn run_research(
    thesis_check_path: &Path,
    candidates_path: &Path,
    theses_path: &Path,
    watchlist_path: &Path,
    reference_date: Option<&str>,
) -> Result<Verdict> {
    let thesis_check = read_json_document(thesis_check_path).with_context(|| {
        format!("Failed to load thesis check {}", thesis_check_path.display())
    })?;
    let candidates = read_json_document(candidates_path)
        .with_context(|| format!("Failed to load candidates {}", candidates_path.display()))?;
    let catalog = ThesisCatalog::from_file(theses_path)
        .with_context(|| format!("Failed to load theses {}", theses_path.display()))?;
    let watchlist = load_watchlist(watchlist_path)?;
    let reference = resolve_reference_date(reference_date)?;

    Ok(validate_research(
        &thesis_check,
        &candidates,
        &catalog.names,
        &watchlist.symbols(),
        reference,
    ))
}

fn load_settings(path: &Path) -> Result<Settings> {
    Settings::from_file(path)
        .with_context(|| format!("Failed to load settings {}", path.display()))
}

fn load_watchlist(path: &Path) -> Result<Watchlist> {
    Watchlist::from_file(path)
        .with_context(|| format!("Failed to load watchlist {}", path.display()))
}

fn resolve_reference_date(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => Ok(parse_reference_date(raw)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

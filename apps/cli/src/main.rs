use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use packkeeper::core::config::MODRINTH_API_BASE;
use packkeeper::filter::{FilterOutput, FilterReport, filter_index};
use packkeeper::manifest::{
    CanonicalStatus, DEFAULT_CATALOG_FILE, DEFAULT_INDEX_FILE, canonicalize_files,
};
use packkeeper::reconcile::{EntryOutcome, ReconcileReport, reconcile_catalog};
use packkeeper::{
    ClientConfig, CurseForgeAPI, CurseForgeConfig, HttpClient, ModrinthAPI, ModrinthConfig, Side,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    Client,
    Server,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Client => Side::Client,
            SideArg::Server => Side::Server,
        }
    }
}

#[derive(Parser)]
#[command(name = "packkeeper", version, about = "Modpack repository maintenance")]
struct Cli {
    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Lookup timeout in seconds
    #[arg(long, global = true, default_value_t = 15)]
    timeout: u64,
    /// Pause between lookups in milliseconds
    #[arg(long, global = true, default_value_t = 150)]
    request_delay_ms: u64,
    /// Retries for transient lookup failures
    #[arg(long, global = true, default_value_t = 4)]
    retries: usize,
    #[command(subcommand)]
    cmd: Cmd,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout),
            request_delay: Duration::from_millis(self.request_delay_ms),
            max_retries: self.retries,
            ..ClientConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Rewrite the pack index and override catalog in canonical form
    Canonicalize(CanonicalizeArgs),
    /// Remove mods unsupported on one side from the pack index
    Filter(FilterArgs),
    /// Replace override artifacts with their newest published version
    Reconcile(ReconcileArgs),
}

#[derive(Args)]
struct CanonicalizeArgs {
    #[arg(long, default_value = DEFAULT_INDEX_FILE)]
    index: PathBuf,
    /// Override catalog; defaults to curseforge_overrides.json next to the index when present
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Only report files that are not canonical, exit non-zero if any
    #[arg(long)]
    check: bool,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(value_enum)]
    side: SideArg,
    #[arg(long, default_value = DEFAULT_INDEX_FILE)]
    index: PathBuf,
    /// Report removals without writing
    #[arg(long, conflicts_with_all = ["output", "backup"])]
    dry_run: bool,
    /// Write the filtered index here instead of in place
    #[arg(long, conflicts_with = "backup")]
    output: Option<PathBuf>,
    /// Keep a timestamped copy of the index before rewriting it
    #[arg(long)]
    backup: bool,
    #[arg(long, default_value = MODRINTH_API_BASE)]
    modrinth_url: String,
}

#[derive(Args)]
struct ReconcileArgs {
    #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
    catalog: PathBuf,
    /// Directory entry paths are resolved against (default: the catalog's directory)
    #[arg(long)]
    root: Option<PathBuf>,
    #[arg(long)]
    curseforge_url: Option<String>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let client = cli.client_config();

    match cli.cmd {
        Cmd::Canonicalize(args) => canonicalize(args),
        Cmd::Filter(args) => filter(args, &client).await,
        Cmd::Reconcile(args) => reconcile(args, &client).await,
    }
}

fn status_line(path: &Path, status: CanonicalStatus) -> String {
    let status = match status {
        CanonicalStatus::Unchanged => "already canonical",
        CanonicalStatus::Rewritten => "rewritten",
        CanonicalStatus::NeedsRewrite => "not canonical",
    };
    format!("{}: {}", path.display(), status)
}

fn canonicalize(args: CanonicalizeArgs) -> Result<()> {
    let catalog = args.catalog.or_else(|| {
        let default = args.index.with_file_name(DEFAULT_CATALOG_FILE);
        default.exists().then_some(default)
    });

    let report = canonicalize_files(&args.index, catalog.as_deref(), args.check)
        .with_context(|| format!("canonicalizing {}", args.index.display()))?;

    println!("{}", status_line(&args.index, report.index));
    if let (Some(path), Some(status)) = (catalog.as_deref(), report.catalog) {
        println!("{}", status_line(path, status));
    }

    if report.needs_rewrite() {
        bail!("some files are not canonical, run without --check to fix them");
    }
    Ok(())
}

fn print_filter_report(report: &FilterReport) {
    for entry in &report.removed {
        println!("Removed {} ({}, {})", entry.path, entry.title, entry.project_id);
    }
    for id in &report.unavailable {
        println!("Kept {} (support unknown)", id);
    }
    println!(
        "Filter ({}): {} removed, {} kept, {} unclassified, {} unextractable",
        report.side,
        report.removed.len(),
        report.kept(),
        report.unavailable.len(),
        report.unextractable
    );
    if let Some(ref backup) = report.backup {
        println!("Backup written to {}", backup.display());
    }
    match report.written {
        Some(ref path) => println!("Wrote {}", path.display()),
        None if report.removed.is_empty() => println!("Nothing to remove"),
        None => println!("Dry run, nothing written"),
    }
}

async fn filter(args: FilterArgs, client: &ClientConfig) -> Result<()> {
    let output = if args.dry_run {
        FilterOutput::DryRun
    } else if let Some(path) = args.output {
        FilterOutput::File(path)
    } else {
        FilterOutput::InPlace {
            backup: args.backup,
        }
    };

    let http = HttpClient::from_config(client)?;
    let modrinth = ModrinthAPI::new(
        &ModrinthConfig {
            base_url: args.modrinth_url,
        },
        http,
    )?;

    let report = filter_index(&args.index, args.side.into(), &modrinth, &output)
        .await
        .with_context(|| format!("filtering {}", args.index.display()))?;
    print_filter_report(&report);
    Ok(())
}

fn print_reconcile_report(report: &ReconcileReport) {
    for entry in &report.entries {
        match entry.outcome {
            EntryOutcome::Done {
                ref file_name,
                size,
                ref deleted,
            } => {
                println!("[done] {} -> {}/{} ({} bytes)", entry.id, entry.path, file_name, size);
                for name in deleted {
                    println!("       deleted {}/{}", entry.path, name);
                }
            }
            EntryOutcome::Skipped(ref reason) => {
                println!("[skipped] {} ({}): {}", entry.id, entry.path, reason);
            }
            EntryOutcome::Failed {
                ref file_name,
                ref error,
                ..
            } => {
                println!("[failed] {} -> {}/{}: {}", entry.id, entry.path, file_name, error);
            }
        }
    }
    println!(
        "Overrides: {} done, {} skipped, {} failed, {} old files deleted",
        report.done(),
        report.skipped(),
        report.failed(),
        report.deleted()
    );
}

async fn reconcile(args: ReconcileArgs, client: &ClientConfig) -> Result<()> {
    dotenv::dotenv().ok();
    let mut config = CurseForgeConfig::from_lookup(|name| std::env::var(name).ok())
        .context("loading CurseForge settings")?;
    if let Some(url) = args.curseforge_url {
        config = config.with_base_url(url);
    }

    let http = HttpClient::from_config(client)?;
    let curseforge = CurseForgeAPI::new(config, http.clone())?;

    let report = reconcile_catalog(&args.catalog, args.root.as_deref(), &curseforge, &http)
        .await
        .with_context(|| format!("reconciling {}", args.catalog.display()))?;
    print_reconcile_report(&report);
    Ok(())
}

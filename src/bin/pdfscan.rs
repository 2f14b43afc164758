//! CLI binary for pdfscan-workflow.
//!
//! Drives one pass through the workflow: populate the listing (upload or
//! load), optionally open a document, select pages and scan them, then
//! print the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfscan_workflow::{
    DocumentId, FileSummary, Operation, PageSelection, PaginationCursor, PdfDetail, ScanSummary,
    StatusKind, StatusMessage, WorkflowConfig, WorkflowObserver, WorkflowSession, WorkflowState,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner that follows the workflow state, plus one
/// log line per status message.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Connecting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl WorkflowObserver for CliObserver {
    fn on_state_change(&self, _from: WorkflowState, to: WorkflowState) {
        let prefix = match to {
            WorkflowState::Idle => "Idle",
            WorkflowState::Listing => "Listing",
            WorkflowState::Viewing => "Viewing",
            WorkflowState::Scanning => "Scanning",
        };
        self.bar.set_prefix(prefix);
    }

    fn on_status(&self, status: &StatusMessage) {
        let line = match status.kind {
            StatusKind::Success => format!("{} {}", green("✓"), status.message),
            StatusKind::Warning => format!("{} {}", yellow("⚠"), status.message),
            StatusKind::Error => format!("{} {}", red("✗"), red(&status.message)),
        };
        self.bar.println(line);
    }

    fn on_document_activated(&self, document: DocumentId, pages: usize) {
        self.bar
            .set_message(format!("document {document} ({pages} pages)"));
    }

    fn on_scan_start(&self, document: DocumentId, pages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {pages} page(s) of document {document}…"))
        ));
        self.bar.set_message("waiting for extraction service");
    }

    fn on_scan_complete(&self, _document: DocumentId, summary: &ScanSummary) {
        self.bar.println(format!(
            "  {} {}/{} pages merged  {}  {}",
            green("✓"),
            summary.merged_pages,
            summary.requested_pages,
            dim(&format!("${:.4}", summary.total_cost)),
            dim(&format!("{:.1}s", summary.total_processing_ms as f64 / 1000.0)),
        ));
    }

    fn on_response_discarded(&self, operation: Operation) {
        self.bar
            .println(dim(&format!("  discarded stale {operation} response")));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the first page of documents still waiting for a scan
  pdfscan

  # Every document, scanned or not
  pdfscan --filter all

  # Upload PDFs and list them
  pdfscan --upload a.pdf b.pdf

  # Show a document's pages
  pdfscan --document 42

  # Scan pages 1-5 of document 42
  pdfscan --document 42 --pages 1-5

  # Scan and print the merged document as JSON
  pdfscan --document 42 --pages 1,3,5 --json > doc.json

ENVIRONMENT VARIABLES:
  PDFSCAN_API_URL         Backend base URL (default http://localhost:8000/api)
  PDFSCAN_PAGE_SIZE       Documents per listing page
  PDFSCAN_REQUEST_TIMEOUT Timeout for listing and detail calls, seconds
  PDFSCAN_SCAN_TIMEOUT    Timeout for scan calls, seconds
  RUST_LOG                Override log filter (e.g. pdfscan_workflow=debug)
"#;

/// Browse uploaded PDFs and scan selected pages through the extraction service.
#[derive(Parser, Debug)]
#[command(
    name = "pdfscan",
    version,
    about = "Browse uploaded PDFs and scan selected pages",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Backend base URL.
    #[arg(long, env = "PDFSCAN_API_URL", default_value = "http://localhost:8000/api")]
    api_url: String,

    /// Upload these PDFs instead of loading the database listing.
    #[arg(long, num_args = 1.., value_name = "FILE")]
    upload: Vec<PathBuf>,

    /// Documents per listing page (1–100).
    #[arg(long, env = "PDFSCAN_PAGE_SIZE", default_value_t = 40)]
    page_size: usize,

    /// Restrict the listing by scan status.
    #[arg(long, value_enum, default_value = "unscanned")]
    filter: FilterArg,

    /// Listing page to show (1-based).
    #[arg(long, default_value_t = 1)]
    list_page: usize,

    /// Open this document.
    #[arg(long, env = "PDFSCAN_DOCUMENT")]
    document: Option<u64>,

    /// Pages to scan in the opened document: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, requires = "document")]
    pages: Option<String>,

    /// Print structured JSON instead of a table.
    #[arg(long, env = "PDFSCAN_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "PDFSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSCAN_QUIET")]
    quiet: bool,

    /// Timeout for upload, listing and detail calls, in seconds.
    #[arg(long, env = "PDFSCAN_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Timeout for scan calls, in seconds.
    #[arg(long, env = "PDFSCAN_SCAN_TIMEOUT", default_value_t = 300)]
    scan_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FilterArg {
    All,
    Scanned,
    Unscanned,
}

impl From<FilterArg> for Option<bool> {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::All => None,
            FilterArg::Scanned => Some(true),
            FilterArg::Unscanned => Some(false),
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    listing: &'a PaginationCursor,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<&'a PdfDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan: Option<&'a ScanSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the feedback; library logs only at error level
    // unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer = show_progress.then(CliObserver::new);
    let config = build_config(&cli, observer.clone())?;
    let session = WorkflowSession::connect(config).context("Failed to create session")?;

    let result = run(&cli, &session).await;
    if let Some(obs) = &observer {
        obs.finish();
    }
    let (listing, document, scan) = result?;

    if cli.json {
        let out = JsonOutput {
            listing: &listing,
            document: document.as_deref(),
            scan: scan.as_ref(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialise output")?
        );
        return Ok(());
    }

    match document {
        Some(doc) => print_document(&doc),
        None => print_listing(&listing),
    }
    if let (Some(summary), false) = (scan, cli.quiet) {
        eprintln!(
            "{}  {}/{} pages  ${:.4}  {}ms",
            if summary.merged_pages == summary.requested_pages {
                green("✔")
            } else {
                yellow("⚠")
            },
            summary.merged_pages,
            summary.requested_pages,
            summary.total_cost,
            summary.total_processing_ms,
        );
    }
    Ok(())
}

type RunOutput = (Arc<PaginationCursor>, Option<Arc<PdfDetail>>, Option<ScanSummary>);

async fn run(cli: &Cli, session: &WorkflowSession) -> Result<RunOutput> {
    // ── Populate the listing ─────────────────────────────────────────────
    let mut listing = if cli.upload.is_empty() {
        session
            .load_documents()
            .await
            .context("Failed to load documents")?
    } else {
        session
            .upload(&cli.upload)
            .await
            .context("Upload failed")?;
        session.snapshot().await.cursor
    };

    for _ in 1..cli.list_page.max(1) {
        listing = session
            .next_page()
            .await
            .context("Failed to move to the next listing page")?;
    }

    // ── Open and scan ────────────────────────────────────────────────────
    let Some(id) = cli.document else {
        return Ok((listing, None, None));
    };
    let mut document = session
        .select_document(DocumentId(id))
        .await
        .with_context(|| format!("Failed to open document {id}"))?;

    let mut scan = None;
    if let Some(ref pages) = cli.pages {
        let selection = parse_pages(pages)?;
        let selected = session.select_pages(&selection).await?;
        if selected == 0 {
            anyhow::bail!("Page selection '{}' matches no pages of document {}", pages, id);
        }
        scan = Some(session.scan().await.context("Scan failed")?);
        if let Some(doc) = session.snapshot().await.active_document {
            document = doc;
        }
    }

    Ok((listing, Some(document), scan))
}

/// Map CLI args to `WorkflowConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<WorkflowConfig> {
    let mut builder = WorkflowConfig::builder()
        .api_base_url(&cli.api_url)
        .page_size(cli.page_size)
        .scanned_filter(cli.filter.clone().into())
        .request_timeout_secs(cli.request_timeout)
        .scan_timeout_secs(cli.scan_timeout);

    if let Some(obs) = observer {
        builder = builder.observer(obs as Arc<dyn WorkflowObserver>);
    }

    builder.build().context("Invalid configuration")
}

fn print_listing(listing: &PaginationCursor) {
    if listing.items.is_empty() {
        println!("{}", dim("(no documents)"));
        return;
    }
    for FileSummary {
        id,
        name,
        page_count,
        scanned,
    } in &listing.items
    {
        println!(
            "{:>6}  {}  {:<40}  {}",
            id,
            if *scanned { green("●") } else { dim("○") },
            name,
            dim(&format!("{page_count} pages")),
        );
    }
    let mut footer = Vec::new();
    if let Some(total) = listing.total_count {
        footer.push(format!("{total} total"));
    }
    if listing.prev_token.is_some() {
        footer.push("has previous".into());
    }
    if listing.next_token.is_some() {
        footer.push("has next".into());
    }
    if !footer.is_empty() {
        println!("{}", dim(&footer.join("  ·  ")));
    }
}

fn print_document(doc: &PdfDetail) {
    println!(
        "{}  {}",
        bold(&doc.name),
        dim(&format!("{}/{} pages scanned", doc.scanned_count(), doc.pages.len()))
    );
    for page in &doc.pages {
        let title = page
            .extracted_data
            .as_ref()
            .map(|d| d.title.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("");
        println!(
            "  {:>4}  {}  {:<8}  {}",
            page.page_number,
            if page.scanned { green("●") } else { dim("○") },
            dim(&format!("id {}", page.id)),
            title,
        );
    }
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;
        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

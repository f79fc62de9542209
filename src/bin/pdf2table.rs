//! CLI binary for pdf2table.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one extraction and reports the CSV path.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2table::{
    extract_table, ErrorKind, ExtractionConfig, ExtractionProgressCallback, Pdf2TableError,
    ProgressCallback,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_TICKS),
        );
        bar.set_prefix("Rendering");
        bar.set_message("rasterising PDF pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    /// Stop the spinner so the error report starts on a clean line.
    fn clear_on_failure(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(SPINNER_TICKS),
        );
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut t) = self.page_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, item_count: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{item_count:>4} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let secs = self.elapsed_secs();
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_extraction_complete(&self, _total_pages: usize, _total_items: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract the line-item table (writes output/<name>_<timestamp>.csv)
  pdf2table "cipl/sample7_Invoice+Packing List-100015.pdf"

  # Custom directories and a lower render resolution
  pdf2table --output-dir results --temp-dir /tmp/pdf2table --dpi 200 invoice.pdf

  # Another provider
  pdf2table --provider openai --model gpt-4.1 invoice.pdf

  # Machine-readable summary
  pdf2table --json invoice.pdf > run.json

OUTPUT:
  One CSV per run with the columns  Commodity Name,Qty,UOM
  encoded as UTF-8 with a byte order mark. Missing Qty defaults to 1,
  missing UOM to BOX. Page images live in temp/pdf_images_<timestamp>/
  and are deleted when the run ends, whether it succeeded or not.

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter (overrides -v / -q)

  A .env file in the working directory is loaded first.
"#;

/// Extract invoice / packing-list line items from a PDF into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2table",
    version,
    about = "Extract invoice / packing-list line items from a PDF into CSV using a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory receiving the CSV.
    #[arg(long, env = "PDF2TABLE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Parent directory of the per-run page-image folder.
    #[arg(long, env = "PDF2TABLE_TEMP_DIR", default_value = "temp")]
    temp_dir: PathBuf,

    /// LLM provider: anthropic, openai, gemini, mistral, ollama, ...
    #[arg(long, env = "PDF2TABLE_PROVIDER", default_value = pdf2table::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Vision model ID.
    #[arg(long, env = "PDF2TABLE_MODEL", default_value = pdf2table::config::DEFAULT_MODEL)]
    model: String,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2TABLE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// JPEG quality for page images (1–100).
    #[arg(long, env = "PDF2TABLE_JPEG_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2TABLE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2TABLE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TABLE_PASSWORD")]
    password: Option<String>,

    /// Text file replacing the built-in extraction rules.
    #[arg(long, env = "PDF2TABLE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "PDF2TABLE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the run summary (rows, pages, stats) as JSON on stdout.
    #[arg(long, env = "PDF2TABLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TABLE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's `env` defaults and the API key lookup see it.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn ExtractionProgressCallback>);
    let fail = |e: anyhow::Error| -> anyhow::Error {
        if let Some(ref cb) = cli_progress {
            cb.clear_on_failure();
        }
        e
    };

    let config = build_config(&cli, progress_cb).await.map_err(&fail)?;

    let output = match extract_table(&cli.input, &config).await {
        Ok(output) => output,
        Err(e) => {
            if cli.json {
                let report = serde_json::to_string_pretty(&ErrorReport::from(&e))
                    .context("Failed to serialise error report")?;
                println!("{report}");
            }
            let context = format!("Error processing document '{}'", cli.input);
            return Err(fail(anyhow::Error::new(e).context(context)));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} rows from {} pages  {}ms",
            green("✔"),
            stats.total_items,
            stats.total_pages,
            stats.total_duration_ms,
        );
        if stats.repaired_rows > 0 {
            eprintln!(
                "   {} rows were missing fields and got defaults",
                stats.repaired_rows
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
        println!("{}", success_line(&output.csv_path));
    } else {
        println!("{}", output.csv_path.display());
    }

    Ok(())
}

/// Final stdout line. Plain text: it is often captured by scripts.
fn success_line(csv_path: &Path) -> String {
    format!("Processing complete. Results saved to: {}", csv_path.display())
}

/// `--json` output when the run fails.
#[derive(Debug, Serialize)]
struct ErrorReport {
    error: String,
    kind: ErrorKind,
}

impl From<&Pdf2TableError> for ErrorReport {
    fn from(e: &Pdf2TableError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .output_dir(&cli.output_dir)
        .temp_dir(&cli.temp_dir)
        .provider_name(&cli.provider)
        .model(&cli.model)
        .dpi(cli.dpi)
        .jpeg_quality(cli.jpeg_quality)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let rules = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {path:?}"))?;
        builder = builder.system_prompt(rules);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

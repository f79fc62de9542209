//! Whole-run entry points.
//!
//! A run moves through
//! `Init → DirectoriesReady → Rasterized → ExtractingPage(1..=N) → Aggregated → CleanedUp`.
//! Any failure jumps straight to `CleanedUp` and the error is returned. The
//! page folder is removed on every path, and no CSV is written unless every
//! page succeeded.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TableError;
use crate::item::LineItem;
use crate::output::{concat_batches, ExtractionOutput, ExtractionStats, PageBatch};
use crate::pipeline::dirs::{self, PageFolder};
use crate::pipeline::llm::{self, LlmVisionModel, VisionModel};
use crate::pipeline::{input, render, table};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Extract the commodity table from a PDF file (or HTTP/HTTPS URL) into CSV.
///
/// # Errors
/// Every failure is fatal: missing credential, unreadable input, rasterisation
/// failure, a failed or unparseable model reply on any page, or a write
/// failure. Rows with missing fields are not errors; they get defaults.
///
/// # Example
/// ```rust,no_run
/// use pdf2table::{extract_table, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Reads ANTHROPIC_API_KEY from the environment.
/// let output = extract_table("invoice.pdf", &ExtractionConfig::default()).await?;
/// println!("{} rows → {}", output.items.len(), output.csv_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn extract_table(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let input_str = input_str.as_ref();
    let result = run(input_str, config).await;
    if let Err(ref e) = result {
        error!("Error processing PDF document {}: {}", input_str, e);
    }
    result
}

/// Synchronous wrapper around [`extract_table`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_table_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TableError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract_table(input_str, config))
}

/// Extract from PDF bytes held in memory.
///
/// `file_name` names the output CSV (its stem is used, as for a file on disk).
/// The bytes are written to a managed temp dir that is removed on return.
pub async fn extract_from_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Pdf2TableError> {
    let tmp = tempfile::tempdir().map_err(|e| Pdf2TableError::Internal(format!("tempdir: {e}")))?;
    let name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_owned())
        .unwrap_or_else(|| "document.pdf".into());
    let path = tmp.path().join(name);

    let mut file = std::fs::File::create(&path)
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile create: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| Pdf2TableError::Internal(format!("tempfile write: {e}")))?;
    drop(file);

    // `tmp` is removed when this function returns.
    extract_table(path.to_string_lossy(), config).await
}

/// Resolve the vision model, from most to least specific.
///
/// 1. A pre-built model in `config.vision_model` is used as-is.
/// 2. Otherwise the provider's API key must be present (looked up through
///    `lookup`) and the provider is built by name.
///
/// No filesystem or network access happens before the credential check.
pub fn resolve_vision_model(
    config: &ExtractionConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn VisionModel>, Pdf2TableError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }

    if let Some(var) = config.credential_var() {
        let present = lookup(var).is_some_and(|v| !v.trim().is_empty());
        if !present {
            return Err(Pdf2TableError::MissingCredential {
                provider: config.provider_name.clone(),
                var: var.to_string(),
            });
        }
    }

    let model = LlmVisionModel::from_factory(&config.provider_name, &config.model)?;
    Ok(Arc::new(model))
}

async fn run(input_str: &str, config: &ExtractionConfig) -> Result<ExtractionOutput, Pdf2TableError> {
    let total_start = Instant::now();
    info!("Starting extraction: {}", input_str);

    // ── Init: credential before any I/O ──────────────────────────────────
    let model = resolve_vision_model(config, |k| std::env::var(k).ok())?;
    debug!("Using vision model {}", model.name());

    // ── DirectoriesReady ─────────────────────────────────────────────────
    dirs::ensure_directories(&[&config.output_dir, &config.temp_dir])?;

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Rasterized … Aggregated, then CleanedUp on every path ───────────
    let folder = PageFolder::create(&config.temp_dir)?;
    let result = extract_and_write(&pdf_path, &folder, model.as_ref(), config).await;
    folder.close();

    let Written {
        csv_path,
        items,
        batches,
        mut stats,
    } = result?;

    stats.total_items = items.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} pages, {} items ({} repaired), {}ms",
        stats.total_pages, stats.total_items, stats.repaired_rows, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(stats.total_pages, stats.total_items);
    }

    Ok(ExtractionOutput {
        csv_path,
        items,
        pages: batches,
        stats,
    })
}

/// What a successful run produced before cleanup.
struct Written {
    csv_path: PathBuf,
    items: Vec<LineItem>,
    batches: Vec<PageBatch>,
    stats: ExtractionStats,
}

/// Everything that happens while the page folder exists: render, extract
/// every page, concatenate, write the CSV.
async fn extract_and_write(
    pdf_path: &Path,
    folder: &PageFolder,
    model: &dyn VisionModel,
    config: &ExtractionConfig,
) -> Result<Written, Pdf2TableError> {
    let (batches, stats) = process_pages(pdf_path, folder, model, config).await?;

    // ── Aggregated ───────────────────────────────────────────────────────
    let items = concat_batches(&batches);
    let csv_path = table::write_table(&config.output_dir, pdf_path, &items)?;

    Ok(Written {
        csv_path,
        items,
        batches,
        stats,
    })
}

/// Rasterise into `folder`, then extract every page in ascending order.
///
/// The first failing page aborts the loop; no later page is attempted.
async fn process_pages(
    pdf_path: &Path,
    folder: &PageFolder,
    model: &dyn VisionModel,
    config: &ExtractionConfig,
) -> Result<(Vec<PageBatch>, ExtractionStats), Pdf2TableError> {
    let render_start = Instant::now();
    let pages = render::rasterize(pdf_path, folder, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let total_pages = pages.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total_pages);
    }

    let llm_start = Instant::now();
    let mut batches = Vec::with_capacity(total_pages);
    for page in &pages {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page.page_num, total_pages);
        }

        match llm::extract_page(model, page, total_pages, config).await {
            Ok(batch) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page.page_num, total_pages, batch.items.len());
                }
                batches.push(batch);
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page.page_num, total_pages, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    let stats = ExtractionStats {
        total_pages,
        total_items: 0,
        repaired_rows: batches.iter().map(|b| b.repaired_rows).sum(),
        total_input_tokens: batches.iter().map(|b| b.input_tokens as u64).sum(),
        total_output_tokens: batches.iter().map(|b| b.output_tokens as u64).sum(),
        total_duration_ms: 0,
        render_duration_ms,
        llm_duration_ms: llm_start.elapsed().as_millis() as u64,
    };

    Ok((batches, stats))
}

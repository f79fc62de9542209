//! # pdf2table
//!
//! Extract commodity line items from invoice / packing-list PDFs into a CSV
//! table using a Vision Language Model.
//!
//! Each page is rasterised to a JPEG and shown to the model together with a
//! fixed instruction: read the product table, return a JSON array of
//! `{"Commodity Name", "Qty", "UOM"}` objects. Rows missing a field are
//! completed with defaults (empty name, quantity 1, unit `BOX`), and all pages
//! are concatenated in page order into one CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Dirs    ensure output/ and temp/ exist; create temp/pdf_images_<ts>/
//!  ├─ 2. Render  rasterise every page to page_<n>.jpg (pdfium, spawn_blocking)
//!  ├─ 3. Encode  JPEG → base64 ImageData
//!  ├─ 4. VLM     one call per page, sequential, temperature 0
//!  ├─ 5. Repair  fill missing fields with defaults, warn per row
//!  └─ 6. Output  output/<stem>_<ts>.csv (UTF-8 with BOM); temp folder removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2table::{extract_table, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Needs ANTHROPIC_API_KEY in the environment.
//!     let config = ExtractionConfig::default();
//!     let output = extract_table("packing_list.pdf", &config).await?;
//!     println!("{}", output.csv_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2table` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod item;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use convert::{extract_from_bytes, extract_table, extract_table_sync, resolve_vision_model};
pub use error::{ErrorKind, Pdf2TableError};
pub use item::{Field, LineItem, RawLineItem};
pub use output::{ExtractionOutput, ExtractionStats, PageBatch, PageImage};
pub use pipeline::llm::{LlmVisionModel, VisionModel, VisionReply, VisionRequest};
pub use pipeline::render::{PageRenderer, PageSink, PdfiumRenderer, RenderOptions};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};

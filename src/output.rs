//! Result types produced by an extraction run.

use crate::item::LineItem;
use serde::Serialize;
use std::path::PathBuf;

/// One rendered page on disk.
///
/// Created by the rasteriser inside the run's page folder and deleted with
/// that folder when the run ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Path to the JPEG rendering.
    pub path: PathBuf,
}

/// All line items extracted from a single page, in the model's row order.
#[derive(Debug, Clone, Serialize)]
pub struct PageBatch {
    /// 1-indexed page number.
    pub page_num: usize,
    pub items: Vec<LineItem>,
    /// Rows that were missing at least one field and got defaults.
    pub repaired_rows: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Wall-clock time for encode + model call + parse, in milliseconds.
    pub duration_ms: u64,
}

/// Aggregate numbers for a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub total_items: usize,
    pub repaired_rows: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Everything a successful run produces.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    /// The CSV file written into the output directory.
    pub csv_path: PathBuf,
    /// The output table: every page's items concatenated in page order.
    pub items: Vec<LineItem>,
    /// Per-page batches (items are repeated here for per-page inspection).
    pub pages: Vec<PageBatch>,
    pub stats: ExtractionStats,
}

/// Concatenate batches into the output table.
///
/// Batches are ordered by ascending page number; rows keep their order within
/// each page.
pub fn concat_batches(batches: &[PageBatch]) -> Vec<LineItem> {
    let mut ordered: Vec<&PageBatch> = batches.iter().collect();
    ordered.sort_by_key(|b| b.page_num);
    ordered
        .into_iter()
        .flat_map(|b| b.items.iter().cloned())
        .collect()
}

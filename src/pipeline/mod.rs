//! Pipeline stages for PDF-to-table extraction.
//!
//! Each submodule implements one step; [`crate::convert`] runs them in order.
//!
//! ## Data Flow
//!
//! ```text
//! dirs ──▶ input ──▶ render ──▶ encode ──▶ llm ──▶ parse ──▶ table
//! (mkdir)  (path/URL) (pdfium→JPEG) (base64) (VLM)  (JSON→rows) (CSV)
//! ```
//!
//! 1. [`dirs`]  : provision output/temp roots; own the run's page folder
//! 2. [`input`] : canonicalise the user-supplied path or URL to a local PDF
//! 3. [`render`]: rasterise every page to `page_<n>.jpg`; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`]: re-encode each page as JPEG and base64-wrap it
//! 5. [`llm`]   : one VLM call per page, then row repair
//! 6. [`parse`] : strict JSON parsing of the reply
//! 7. [`table`] : write the concatenated rows as a BOM-prefixed CSV

pub mod dirs;
pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
pub mod table;

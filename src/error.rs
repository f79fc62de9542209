//! Error types for the pdf2table library.
//!
//! Every variant of [`Pdf2TableError`] is fatal: the run stops, the page
//! folder is removed, and the error is returned to the caller. No partial
//! CSV is produced from the pages that did succeed.
//!
//! The only condition recovered locally is a row with missing fields. That is
//! not an error at all: the row is completed with defaults, logged at WARN and
//! counted in [`crate::output::PageBatch::repaired_rows`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2table library.
#[derive(Debug, Error)]
pub enum Pdf2TableError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The API key for the selected provider is not set.
    #[error("{var} is not set.\nThe '{provider}' vision provider needs an API key; export {var}=... or add it to .env.")]
    MissingCredential { provider: String, var: String },

    /// The provider could not be constructed (unknown name, bad model, ...).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be written as JPEG.
    #[error("Failed to write page image '{path}': {detail}")]
    PageImageWriteFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A page image could not be re-read or re-encoded for upload.
    #[error("Page {page}: image encoding failed: {detail}")]
    ImageEncodingFailed { page: usize, detail: String },

    /// The vision provider call failed (network, auth, rate limit, ...).
    #[error("Page {page}: LLM API error: {message}")]
    LlmApiError { page: usize, message: String },

    /// The model replied with something that is not a JSON array of objects.
    #[error("Page {page}: model reply is not a JSON array of row objects: {detail}")]
    MalformedResponse { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A required directory could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV writer rejected a record.
    #[error("Failed to write CSV '{path}': {source}")]
    CsvWriteFailed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`Pdf2TableError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    /// Missing credential or invalid settings; raised before any I/O.
    Configuration,
    /// The input could not be located, downloaded or recognised as a PDF.
    Input,
    /// The PDF could not be turned into page images.
    Rasterization,
    /// A page could not be sent to, or understood from, the model.
    Extraction,
    /// A directory or the output table could not be written.
    Write,
    Internal,
}

impl Pdf2TableError {
    /// Which stage of the run this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use Pdf2TableError::*;
        match self {
            MissingCredential { .. } | ProviderNotConfigured { .. } | InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            FileNotFound { .. }
            | PermissionDenied { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | NotAPdf { .. } => ErrorKind::Input,
            CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | RasterisationFailed { .. }
            | PageImageWriteFailed { .. }
            | PdfiumBindingFailed(_) => ErrorKind::Rasterization,
            ImageEncodingFailed { .. } | LlmApiError { .. } | MalformedResponse { .. } => {
                ErrorKind::Extraction
            }
            DirectoryCreateFailed { .. } | OutputWriteFailed { .. } | CsvWriteFailed { .. } => {
                ErrorKind::Write
            }
            Internal(_) => ErrorKind::Internal,
        }
    }
}

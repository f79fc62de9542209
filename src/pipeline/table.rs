//! Output table writer.
//!
//! Writes `<output_dir>/<source-stem>_<YYYYMMDD_HHMMSS>.csv`: a UTF-8 byte
//! order mark, the header row, then one row per line item. The BOM makes
//! Excel open non-ASCII commodity names correctly. The file is created
//! exclusively; if a run in the same second already took the name, `_2`,
//! `_3`, ... is appended.

use crate::error::Pdf2TableError;
use crate::item::{LineItem, COLUMNS};
use crate::pipeline::dirs::{candidate_name, run_timestamp};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// UTF-8 byte order mark.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: usize = 100;

/// File stem used to name the CSV, e.g. `invoice` for `cipl/invoice.pdf`.
pub fn source_stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Write `items` to a fresh timestamped CSV in `output_dir`.
pub fn write_table(
    output_dir: &Path,
    source: &Path,
    items: &[LineItem],
) -> Result<PathBuf, Pdf2TableError> {
    let base = format!("{}_{}", source_stem(source), run_timestamp());
    let (path, file) = create_unique(output_dir, &base)?;
    write_rows(file, &path, items)?;
    info!("Successfully saved {} rows to {}", items.len(), path.display());
    Ok(path)
}

fn create_unique(output_dir: &Path, base: &str) -> Result<(PathBuf, File), Pdf2TableError> {
    let mut last_path = output_dir.join(format!("{base}.csv"));
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let path = output_dir.join(format!("{}.csv", candidate_name(base, attempt)));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_path = path,
            Err(e) => return Err(Pdf2TableError::OutputWriteFailed { path, source: e }),
        }
    }
    Err(Pdf2TableError::OutputWriteFailed {
        path: last_path,
        source: io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{MAX_NAME_ATTEMPTS} files named '{base}*.csv' already exist"),
        ),
    })
}

/// BOM, header, rows. Separate from file creation so it can target any writer.
fn write_rows<W: Write>(mut out: W, path: &Path, items: &[LineItem]) -> Result<(), Pdf2TableError> {
    out.write_all(UTF8_BOM)
        .map_err(|e| Pdf2TableError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let csv_failed = |source: csv::Error| Pdf2TableError::CsvWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(COLUMNS).map_err(csv_failed)?;
    for item in items {
        wtr.write_record(item.to_record()).map_err(csv_failed)?;
    }
    wtr.flush().map_err(|e| Pdf2TableError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

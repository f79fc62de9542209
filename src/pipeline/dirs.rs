//! Directory provisioning and the run-scoped page folder.
//!
//! The output and temp roots are created on every run (`create_dir_all` is
//! a no-op for directories that already exist). Page images live in a
//! [`PageFolder`] under the temp root, named `pdf_images_<YYYYMMDD_HHMMSS>`.
//! The folder is backed by a [`tempfile::TempDir`], so it is removed when the
//! run ends on every path: explicitly through [`PageFolder::close`] on the
//! normal path, or by `Drop` when an error unwinds past it.

use crate::error::Pdf2TableError;
use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 100;

/// Local wall-clock timestamp used in folder and file names.
pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `base` on the first attempt, then `base_2`, `base_3`, ...
pub(crate) fn candidate_name(base: &str, attempt: usize) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}_{attempt}")
    }
}

/// Create every directory in `dirs` that does not exist yet.
pub fn ensure_directories<P: AsRef<Path>>(dirs: &[P]) -> Result<(), Pdf2TableError> {
    for dir in dirs {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Pdf2TableError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        info!("Ensured directory exists: {}", dir.display());
    }
    Ok(())
}

/// Exclusively owned folder holding one run's page images.
#[derive(Debug)]
pub struct PageFolder {
    dir: TempDir,
}

impl PageFolder {
    /// Create `<temp_root>/pdf_images_<timestamp>`.
    pub fn create(temp_root: &Path) -> Result<Self, Pdf2TableError> {
        Self::create_named(temp_root, &format!("pdf_images_{}", run_timestamp()))
    }

    /// Create `<temp_root>/<base>`, or `<base>_N` if that name is taken.
    pub fn create_named(temp_root: &Path, base: &str) -> Result<Self, Pdf2TableError> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let name = candidate_name(base, attempt);
            match tempfile::Builder::new()
                .prefix(&name)
                .rand_bytes(0)
                .tempdir_in(temp_root)
            {
                Ok(dir) => {
                    debug!("Created page folder {}", dir.path().display());
                    return Ok(Self { dir });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Pdf2TableError::DirectoryCreateFailed {
                        path: temp_root.join(name),
                        source: e,
                    })
                }
            }
        }

        Err(Pdf2TableError::DirectoryCreateFailed {
            path: temp_root.join(base),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{MAX_NAME_ATTEMPTS} folders named '{base}*' already exist"),
            ),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where page `page_num` (1-indexed) is written.
    pub fn page_path(&self, page_num: usize) -> PathBuf {
        self.dir.path().join(format!("page_{page_num}.jpg"))
    }

    /// Remove the folder and everything in it.
    ///
    /// A failure here is logged, not returned: the run's outcome is already
    /// decided by the time cleanup happens.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => info!("Cleaned up temporary folder: {}", path.display()),
            Err(e) => warn!("Error cleaning up temporary folder {}: {}", path.display(), e),
        }
    }
}

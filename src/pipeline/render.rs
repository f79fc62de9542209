//! PDF rasterisation: render every page and write it as a JPEG into the
//! run's page folder.
//!
//! Rendering sits behind the [`PageRenderer`] trait. The default
//! [`PdfiumRenderer`] wraps `pdfium-render`; tests and embedders can supply
//! their own. Renderers hand pages to a sink one at a time, so only one
//! full-resolution bitmap is alive at once even at 300 DPI.
//!
//! pdfium is not async-safe, so [`rasterize`] runs the renderer and the JPEG
//! writes inside `tokio::task::spawn_blocking`.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TableError;
use crate::output::PageImage;
use crate::pipeline::dirs::PageFolder;
use image::DynamicImage;
use jpeg_encoder::{ColorType, Encoder};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Rendering parameters shared by all renderers.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub password: Option<String>,
}

impl RenderOptions {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }
}

/// Receives each rendered page: `(page_index_0based, image)`.
pub type PageSink<'a> = dyn FnMut(usize, DynamicImage) -> Result<(), Pdf2TableError> + 'a;

/// Turns a PDF into page images, in page order.
pub trait PageRenderer: Send + Sync {
    /// Render every page of `pdf_path`, calling `sink` once per page in
    /// ascending order. Returns the number of pages rendered.
    fn render(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, Pdf2TableError>;
}

/// Renderer backed by the pdfium C++ library.
///
/// Library lookup order: `library_path`, then `PDFIUM_LIB_PATH`, then the
/// current directory, then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    pub library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium, Pdf2TableError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(&path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| Pdf2TableError::PdfiumBindingFailed(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, Pdf2TableError> {
        let pdfium = self.bind()?;
        let password = options.password.as_deref();

        let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
            let err_str = format!("{e:?}");
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    Pdf2TableError::WrongPassword {
                        path: pdf_path.to_path_buf(),
                    }
                } else {
                    Pdf2TableError::PasswordRequired {
                        path: pdf_path.to_path_buf(),
                    }
                }
            } else {
                Pdf2TableError::CorruptPdf {
                    path: pdf_path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let max_pixels = options.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(options.dpi as f32 / POINTS_PER_INCH)
            .set_maximum_width(max_pixels)
            .set_maximum_height(max_pixels);

        for idx in 0..total_pages {
            let page = pages
                .get(idx as u16)
                .map_err(|e| Pdf2TableError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                Pdf2TableError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            sink(idx, image)?;
        }

        Ok(total_pages)
    }
}

/// Write `image` to `path` as a progressive JPEG with optimised Huffman tables.
pub fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), Pdf2TableError> {
    let write_failed = |detail: String| Pdf2TableError::PageImageWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let (width, height) = match (u16::try_from(rgb.width()), u16::try_from(rgb.height())) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(write_failed(format!(
                "{}x{} px exceeds the JPEG limit of 65535 px per edge",
                rgb.width(),
                rgb.height()
            )))
        }
    };

    let mut encoder = Encoder::new_file(path, quality).map_err(|e| write_failed(e.to_string()))?;
    encoder.set_progressive(true);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| write_failed(e.to_string()))
}

/// Render every page of `pdf_path` into `folder` as `page_<n>.jpg`.
///
/// Returns one [`PageImage`] per page, in ascending page order. Any failure
/// aborts the whole rasterisation; pages already written are left for the
/// folder's cleanup.
pub async fn rasterize(
    pdf_path: &Path,
    folder: &PageFolder,
    config: &ExtractionConfig,
) -> Result<Vec<PageImage>, Pdf2TableError> {
    let renderer: Arc<dyn PageRenderer> = match &config.renderer {
        Some(r) => Arc::clone(r),
        None => Arc::new(PdfiumRenderer::new()),
    };
    let pdf = pdf_path.to_path_buf();
    let dir = folder.path().to_path_buf();
    let options = RenderOptions::from_config(config);
    let quality = config.jpeg_quality;

    let pages = tokio::task::spawn_blocking(move || -> Result<Vec<PageImage>, Pdf2TableError> {
        let mut pages = Vec::new();
        let mut sink = |idx: usize, image: DynamicImage| -> Result<(), Pdf2TableError> {
            let page_num = idx + 1;
            let path = dir.join(format!("page_{page_num}.jpg"));
            write_jpeg(&image, &path, quality)?;
            pages.push(PageImage { page_num, path });
            Ok(())
        };
        let rendered = renderer.render(&pdf, &options, &mut sink)?;
        if rendered != pages.len() {
            return Err(Pdf2TableError::Internal(format!(
                "renderer reported {rendered} pages but produced {}",
                pages.len()
            )));
        }
        Ok(pages)
    })
    .await
    .map_err(|e| Pdf2TableError::Internal(format!("Render task panicked: {e}")))??;

    info!(
        "Converted PDF to {} images in {}",
        pages.len(),
        folder.path().display()
    );
    Ok(pages)
}

//! Configuration for a PDF-to-table extraction run.
//!
//! Everything a run needs, including the directory layout, is carried by
//! [`ExtractionConfig`] and passed into the entry point. Nothing is read from
//! process globals except the provider's API key, which is looked up once at
//! the start of the run.

use crate::error::Pdf2TableError;
use crate::pipeline::llm::VisionModel;
use crate::pipeline::render::PageRenderer;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default provider and model.
pub const DEFAULT_PROVIDER: &str = "anthropic";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2table::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .output_dir("out")
///     .model("claude-3-5-sonnet-20241022")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 8192);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Cap on either edge of a rendered page, in pixels. Default: 6000.
    ///
    /// A letter page at 300 DPI is 2550 × 3300 px; the cap only bites on
    /// oversized sheets.
    pub max_rendered_pixels: u32,

    /// JPEG quality for page images and uploads. Range: 1–100. Default: 95.
    pub jpeg_quality: u8,

    /// Directory receiving one CSV per run. Default: `output`.
    pub output_dir: PathBuf,

    /// Parent of the per-run page folders. Default: `temp`.
    pub temp_dir: PathBuf,

    /// Provider name understood by `edgequake_llm::ProviderFactory`. Default: `anthropic`.
    pub provider_name: String,

    /// Model identifier. Default: `claude-3-5-sonnet-20241022`.
    pub model: String,

    /// Sampling temperature. Default: 0.0 (deterministic).
    pub temperature: f32,

    /// Output-token ceiling per page. Default: 8192.
    ///
    /// Long packing lists produce long JSON arrays; a truncated reply is not
    /// valid JSON and aborts the run.
    pub max_tokens: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Replacement for the built-in extraction rules.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-built vision model. Takes precedence over `provider_name`/`model`
    /// and skips the API-key check.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Pre-built page renderer. Default: pdfium.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 6000,
            jpeg_quality: 95,
            output_dir: PathBuf::from("output"),
            temp_dir: PathBuf::from("temp"),
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 8192,
            password: None,
            system_prompt: None,
            download_timeout_secs: 120,
            vision_model: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("output_dir", &self.output_dir)
            .field("temp_dir", &self.temp_dir)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("system_prompt", &self.system_prompt.is_some())
            .field("vision_model", &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PageRenderer>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Environment variable holding the API key for `provider_name`.
    ///
    /// `None` for local providers that need no key.
    pub fn credential_var(&self) -> Option<&'static str> {
        credential_var_for(&self.provider_name)
    }
}

/// Environment variable holding the API key for a provider.
pub fn credential_var_for(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "azure" => Some("AZURE_OPENAI_API_KEY"),
        // Local servers (ollama, lmstudio) and unknown names: the factory decides.
        _ => None,
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2TableError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.output_dir.as_os_str().is_empty() || c.temp_dir.as_os_str().is_empty() {
            return Err(Pdf2TableError::InvalidConfig(
                "output and temp directories must not be empty paths".into(),
            ));
        }
        if c.vision_model.is_none() && c.model.trim().is_empty() {
            return Err(Pdf2TableError::InvalidConfig("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

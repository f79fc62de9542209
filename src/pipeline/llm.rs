//! VLM interaction: send one page image with the extraction instruction and
//! turn the reply into a [`PageBatch`].
//!
//! The provider sits behind the [`VisionModel`] trait. [`LlmVisionModel`]
//! adapts any `edgequake_llm` provider; tests and embedders can plug in their
//! own implementation through
//! [`crate::config::ExtractionConfigBuilder::vision_model`].
//!
//! There is no retry here. A failed call or an unparseable reply aborts the
//! page, and with it the run.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TableError;
use crate::item::{LineItem, RawLineItem};
use crate::output::{PageBatch, PageImage};
use crate::pipeline::{encode, parse};
use crate::prompts::page_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One page's request to the model.
#[derive(Clone)]
pub struct VisionRequest {
    /// 1-indexed page number.
    pub page_num: usize,
    pub total_pages: usize,
    /// Instruction text sent alongside the image.
    pub prompt: String,
    /// Base64 JPEG of the page.
    pub image: ImageData,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The model's raw reply.
#[derive(Debug, Clone, Default)]
pub struct VisionReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A vision-capable model that answers one page at a time.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Short label for logs, e.g. `anthropic/claude-3-5-sonnet-20241022`.
    fn name(&self) -> &str;

    /// Send the instruction and image; return the reply text unparsed.
    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, Pdf2TableError>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmVisionModel {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Build a provider by name; the factory reads the provider's API key
    /// from the environment.
    pub fn from_factory(provider_name: &str, model: &str) -> Result<Self, Pdf2TableError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            Pdf2TableError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}/{model}")))
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, Pdf2TableError> {
        // Instruction and image travel together in a single user turn.
        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![request.image.clone()],
        )];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| Pdf2TableError::LlmApiError {
                page: request.page_num,
                message: format!("{e}"),
            })?;

        Ok(VisionReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Extract the line items from one page image.
pub async fn extract_page(
    model: &dyn VisionModel,
    page: &PageImage,
    total_pages: usize,
    config: &ExtractionConfig,
) -> Result<PageBatch, Pdf2TableError> {
    let start = Instant::now();
    let page_num = page.page_num;

    let image = encode::encode_page_file(&page.path, config.jpeg_quality).map_err(|e| {
        Pdf2TableError::ImageEncodingFailed {
            page: page_num,
            detail: e.to_string(),
        }
    })?;

    let request = VisionRequest {
        page_num,
        total_pages,
        prompt: page_prompt(page_num, total_pages, config.system_prompt.as_deref()),
        image,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let reply = model.complete(&request).await?;
    debug!(
        "Page {}: {} input tokens, {} output tokens, {} reply bytes",
        page_num,
        reply.input_tokens,
        reply.output_tokens,
        reply.text.len()
    );

    let raw_rows = parse::parse_rows(&reply.text)
        .map_err(|detail| Pdf2TableError::MalformedResponse { page: page_num, detail })?;
    let (items, repaired_rows) = repair_rows(page_num, &raw_rows);

    info!("Page {}: Extracted {} items", page_num, items.len());

    Ok(PageBatch {
        page_num,
        items,
        repaired_rows,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Complete every row, warning about each one that needed defaults.
///
/// Returns the items and the number of repaired rows.
pub fn repair_rows(page_num: usize, rows: &[RawLineItem]) -> (Vec<LineItem>, usize) {
    let mut repaired = 0;
    let items = rows
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let fixed = raw.repair();
            if fixed.was_repaired() {
                repaired += 1;
                let missing: Vec<&str> = fixed.defaulted.iter().map(|f| f.column()).collect();
                warn!(
                    "Invalid item structure on page {}, row {}: {} missing; defaults applied",
                    page_num,
                    i + 1,
                    missing.join(", ")
                );
            }
            fixed.item
        })
        .collect();
    (items, repaired)
}

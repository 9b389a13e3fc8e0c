//! Route extraction: OCR text + page number → structured route page.
//!
//! Extraction sits behind the narrow [`RouteExtractor`] interface so the
//! rest of the run can be exercised with canned pages. The default
//! [`LlmRouteExtractor`] sends the text to an `edgequake-llm` provider.
//!
//! ## Retry Strategy
//!
//! Provider errors (HTTP 429 / 5xx, timeouts) are retried with exponential
//! backoff (`retry_backoff_ms * 2^attempt`). A reply that arrives but does
//! not parse is not retried: the page simply has no recognizable routes.

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::{CroquiError, PageError};
use crate::pipeline::{encode, postprocess};
use crate::prompts::{page_message, DEFAULT_EXTRACTION_PROMPT};
use crate::route::{page_image_path, CroquiPage};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// A structured page plus how many retries it took.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub page: CroquiPage,
    pub retries: u8,
}

/// Turns one page of recognised text into routes.
pub trait RouteExtractor: Send + Sync {
    fn extract(
        &self,
        text: &str,
        page_num: usize,
    ) -> impl Future<Output = Result<Extraction, PageError>> + Send;
}

/// [`RouteExtractor`] backed by a chat-completion provider.
pub struct LlmRouteExtractor {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    /// Folder to read `page_{N}.png` from when images are attached.
    image_folder: Option<PathBuf>,
}

impl LlmRouteExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            image_folder: None,
        }
    }

    /// Resolve the provider from the config and environment, then build.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, CroquiError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    /// Send `folder/page_{N}.png` along with each page's text.
    pub fn with_page_images(mut self, folder: impl AsRef<Path>) -> Self {
        self.image_folder = Some(folder.as_ref().to_path_buf());
        self
    }

    fn build_messages(&self, text: &str, page_num: usize) -> Vec<ChatMessage> {
        let images: Vec<ImageData> = self
            .image_folder
            .as_deref()
            .and_then(|folder| {
                let path = page_image_path(folder, page_num as u32);
                encode::encode_page_file(&path)
                    .map_err(|e| warn!("Page {}: not attaching image: {}", page_num, e))
                    .ok()
            })
            .into_iter()
            .collect();

        let content = page_message(text, page_num);
        let user = if images.is_empty() {
            ChatMessage::user(content)
        } else {
            ChatMessage::user_with_images(content, images)
        };
        vec![ChatMessage::system(self.system_prompt.as_str()), user]
    }
}

impl RouteExtractor for LlmRouteExtractor {
    async fn extract(&self, text: &str, page_num: usize) -> Result<Extraction, PageError> {
        let messages = self.build_messages(text, page_num);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens",
                        page_num, response.prompt_tokens, response.completion_tokens
                    );
                    let page = postprocess::parse_page(&response.content, page_num)?;
                    return Ok(Extraction {
                        page,
                        retries: attempt as u8,
                    });
                }
                Err(e) => {
                    let err_msg = format!("{e}");
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(PageError::LlmFailed {
            page: page_num,
            retries: self.max_retries as u8,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, CroquiError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CroquiError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` with `config.model`
/// 3. `CROQUI_LLM_PROVIDER` + `CROQUI_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. [`ProviderFactory::from_env`]
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, CroquiError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("CROQUI_LLM_PROVIDER"),
        std::env::var("CROQUI_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| CroquiError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

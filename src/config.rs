//! Configuration types for document translation jobs.
//!
//! Every knob of a job lives in [`TranslationConfig`], built via its
//! [`TranslationConfigBuilder`]. The stage-specific option structs
//! ([`LayoutOptions`], [`TokenizerOptions`], [`ListNesting`], [`PageStyle`])
//! are owned by their pipeline modules and only collected here.

use crate::error::DocuglotError;
use crate::pipeline::layout::LayoutOptions;
use crate::pipeline::pack::PageStyle;
use crate::pipeline::reconstruct::ListNesting;
use crate::pipeline::tokenize::TokenizerOptions;
use crate::pipeline::translate::Translator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for a translation job.
///
/// Built via [`TranslationConfig::builder()`] or using
/// [`TranslationConfig::default()`] (English → Spanish).
///
/// # Example
/// ```rust
/// use docuglot::TranslationConfig;
///
/// let config = TranslationConfig::builder()
///     .source_language("en")
///     .target_language("fr")
///     .custom_prompt("Use formal {targetLanguage}.")
///     .build()
///     .unwrap();
/// assert_eq!(config.target_language, "fr");
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Language code of the input document. Default: "en".
    pub source_language: String,

    /// Language code to translate into. Default: "es".
    pub target_language: String,

    /// Ask the model to keep every Markdown marker and show it few-shot
    /// examples. Default: true.
    pub preserve_formatting: bool,

    /// Extra instructions appended to the system message. `{targetLanguage}`
    /// is replaced with the target language name.
    pub custom_prompt: Option<String>,

    /// Replaces the built-in translator guidelines.
    pub system_prompt: Option<String>,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Replaces the LLM collaborator entirely. Takes precedence over every
    /// provider setting.
    pub translator: Option<Arc<dyn Translator>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4000.
    pub max_tokens: usize,

    /// Retry attempts after a failed translation call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the translation request in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF geometry thresholds.
    pub layout: LayoutOptions,

    /// Markup parser options shared by the Word cleanup pass and the reconstructor.
    pub tokenizer: TokenizerOptions,

    /// How list nesting reaches the document. Default: [`ListNesting::Tracked`].
    pub list_nesting: ListNesting,

    /// Fonts, margins, spacing and numbering of the generated document.
    pub page_style: PageStyle,

    /// Jobs run at once by [`crate::batch::translate_batch`]. Default: 4.
    pub concurrency: usize,

    /// Optional observer for job lifecycle events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "es".to_string(),
            preserve_formatting: true,
            custom_prompt: None,
            system_prompt: None,
            model: None,
            provider_name: None,
            provider: None,
            translator: None,
            temperature: 0.3,
            max_tokens: 4000,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            password: None,
            download_timeout_secs: 120,
            layout: LayoutOptions::default(),
            tokenizer: TokenizerOptions::default(),
            list_nesting: ListNesting::default(),
            page_style: PageStyle::default(),
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("preserve_formatting", &self.preserve_formatting)
            .field("custom_prompt", &self.custom_prompt)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("translator", &self.translator.as_ref().map(|t| t.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("layout", &self.layout)
            .field("tokenizer", &self.tokenizer)
            .field("list_nesting", &self.list_nesting)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model name after applying the default.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`TranslationConfig`].
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl TranslationConfigBuilder {
    pub fn source_language(mut self, code: impl Into<String>) -> Self {
        self.config.source_language = code.into();
        self
    }

    pub fn target_language(mut self, code: impl Into<String>) -> Self {
        self.config.target_language = code.into();
        self
    }

    pub fn preserve_formatting(mut self, v: bool) -> Self {
        self.config.preserve_formatting = v;
        self
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.custom_prompt = Some(prompt.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn layout(mut self, layout: LayoutOptions) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn tokenizer(mut self, options: TokenizerOptions) -> Self {
        self.config.tokenizer = options;
        self
    }

    pub fn list_nesting(mut self, nesting: ListNesting) -> Self {
        self.config.list_nesting = nesting;
        self
    }

    pub fn page_style(mut self, style: PageStyle) -> Self {
        self.config.page_style = style;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslationConfig, DocuglotError> {
        let c = &self.config;
        if c.source_language.trim().is_empty() || c.target_language.trim().is_empty() {
            return Err(DocuglotError::InvalidConfig(
                "Source and target languages are required".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocuglotError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        let l = &c.layout;
        if !(l.h1_size >= l.h2_size && l.h2_size >= l.h3_size && l.h3_size > 0.0) {
            return Err(DocuglotError::InvalidConfig(format!(
                "Heading sizes must satisfy h1 ≥ h2 ≥ h3 > 0, got {}/{}/{}",
                l.h1_size, l.h2_size, l.h3_size
            )));
        }
        if !(0.0..0.5).contains(&l.band) {
            return Err(DocuglotError::InvalidConfig(format!(
                "Header/footer band must be in [0, 0.5), got {}",
                l.band
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_a_fresh_config() {
        let c = TranslationConfig::default();
        assert_eq!(c.model_or_default(), "gpt-4o-mini");
        assert_eq!(c.temperature, 0.3);
        assert_eq!(c.max_tokens, 4000);
        assert!(c.preserve_formatting);
        assert_eq!(c.list_nesting, ListNesting::Tracked);
        assert_eq!(c.page_style.font, "Calibri");
    }

    #[test]
    fn builder_clamps() {
        let c = TranslationConfig::builder()
            .temperature(5.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn empty_language_is_rejected() {
        let err = TranslationConfig::builder()
            .target_language("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, DocuglotError::InvalidConfig(_)));
    }

    #[test]
    fn inverted_heading_sizes_are_rejected() {
        let layout = LayoutOptions {
            h1_size: 12.0,
            ..Default::default()
        };
        assert!(TranslationConfig::builder().layout(layout).build().is_err());
    }

    #[test]
    fn same_language_is_allowed() {
        let c = TranslationConfig::builder()
            .source_language("es")
            .target_language("es")
            .build();
        assert!(c.is_ok());
    }
}

//! Translation collaborator: normalized markup in, translated markup out.
//!
//! The pipeline only sees the [`Translator`] trait. [`LlmTranslator`] is the
//! production implementation on top of an `edgequake_llm` provider; tests and
//! offline callers plug in their own implementation through
//! [`crate::config::TranslationConfigBuilder::translator`].
//!
//! ## Retry Strategy
//!
//! Every failed chat call (including a timeout) is retried with exponential
//! backoff, `retry_backoff_ms * 2^(attempt - 1)`. An empty completion is not
//! retried; it surfaces as [`DocuglotError::EmptyTranslation`].

use crate::config::TranslationConfig;
use crate::error::DocuglotError;
use crate::languages::language_name;
use crate::pipeline::postprocess::clean_translated_markup;
use crate::prompts::{
    custom_instructions, document_message, examples_message, fill_languages,
    DEFAULT_SYSTEM_PROMPT, FORMATTING_INSTRUCTIONS, RESPONSE_INSTRUCTION,
};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// What to translate the markup into, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_language: String,
    pub target_language: String,
    pub preserve_formatting: bool,
    pub custom_prompt: Option<String>,
    /// Replaces the default translator guidelines.
    pub system_prompt: Option<String>,
}

impl TranslationRequest {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            preserve_formatting: config.preserve_formatting,
            custom_prompt: config.custom_prompt.clone(),
            system_prompt: config.system_prompt.clone(),
        }
    }
}

/// A finished translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translated {
    /// Translated markup, already passed through the translated-output cleanup.
    pub markup: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
}

/// Turns one normalized markup string into its translation.
///
/// Implementations must keep heading markers, emphasis markers and list
/// prefixes verbatim around the translated text.
pub trait Translator: Send + Sync {
    /// Short name used in logs and stats.
    fn name(&self) -> &str {
        "custom"
    }

    fn translate<'a>(
        &'a self,
        markup: &'a str,
        request: &'a TranslationRequest,
    ) -> BoxFuture<'a, Result<Translated, DocuglotError>>;
}

/// [`Translator`] backed by a chat-completion provider.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &TranslationConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn run(
        &self,
        markup: &str,
        request: &TranslationRequest,
    ) -> Result<Translated, DocuglotError> {
        let start = Instant::now();
        let messages = build_messages(markup, request);
        let options = self.options();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Translation: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            let outcome = timeout(Duration::from_secs(self.api_timeout_secs), call).await;

            match outcome {
                Ok(Ok(response)) => {
                    debug!(
                        "Translation: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let cleaned = clean_translated_markup(&response.content);
                    if cleaned.trim().is_empty() {
                        return Err(DocuglotError::EmptyTranslation);
                    }
                    return Ok(Translated {
                        markup: cleaned,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        retries: attempt,
                    });
                }
                Ok(Err(e)) => {
                    let err_msg = e.to_string();
                    warn!("Translation: attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
                Err(_) => {
                    let err_msg = format!("no response within {}s", self.api_timeout_secs);
                    warn!("Translation: attempt {} timed out", attempt + 1);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(DocuglotError::TranslationFailed {
            retries: self.max_retries,
            message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

impl Translator for LlmTranslator {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn translate<'a>(
        &'a self,
        markup: &'a str,
        request: &'a TranslationRequest,
    ) -> BoxFuture<'a, Result<Translated, DocuglotError>> {
        Box::pin(self.run(markup, request))
    }
}

/// Build the chat messages for one translation.
///
/// ## Message Layout
///
/// 1. **System**: guidelines with both language names filled in, the Markdown
///    preservation rules (preserve_formatting only), the custom instructions
///    section (when given) and the respond-only line.
/// 2. **Assistant** *(preserve_formatting only)*: acknowledgement with the
///    few-shot examples.
/// 3. **User**: the document.
pub fn build_messages(markup: &str, request: &TranslationRequest) -> Vec<ChatMessage> {
    let source = language_name(&request.source_language);
    let target = language_name(&request.target_language);

    let guidelines = request
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let formatting = if request.preserve_formatting {
        FORMATTING_INSTRUCTIONS
    } else {
        ""
    };
    let custom = request
        .custom_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("\n{}", custom_instructions(p, target)))
        .unwrap_or_default();

    let system = format!(
        "{}\n\n{}\n{}\n\n{}",
        fill_languages(guidelines, source, target),
        formatting,
        custom,
        RESPONSE_INSTRUCTION
    );

    let mut messages = vec![ChatMessage::system(system)];
    if request.preserve_formatting {
        messages.push(ChatMessage::assistant(examples_message(source, target)));
    }
    messages.push(ChatMessage::user(document_message(markup)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(preserve: bool, custom: Option<&str>) -> TranslationRequest {
        TranslationRequest {
            source_language: "en".into(),
            target_language: "es".into(),
            preserve_formatting: preserve,
            custom_prompt: custom.map(str::to_string),
            system_prompt: None,
        }
    }

    #[test]
    fn preserving_formatting_adds_examples_turn() {
        let msgs = build_messages("# Hi", &request(true, None));
        assert_eq!(msgs.len(), 3);
        assert!(msgs[0].content.contains("from English to Spanish"));
        assert!(msgs[0].content.contains("You MUST preserve all Markdown syntax"));
        assert!(msgs[1].content.contains("Original: "));
        assert_eq!(
            msgs[2].content,
            "Please translate the following document:\n\n# Hi"
        );
    }

    #[test]
    fn plain_translation_has_two_turns() {
        let msgs = build_messages("text", &request(false, None));
        assert_eq!(msgs.len(), 2);
        assert!(!msgs[0].content.contains("Markdown syntax"));
        assert!(msgs[0].content.ends_with(RESPONSE_INSTRUCTION));
    }

    #[test]
    fn custom_prompt_is_included_with_target_name() {
        let msgs = build_messages("text", &request(true, Some("Write for {targetLanguage} kids")));
        assert!(msgs[0]
            .content
            .contains("Additional Translation Instructions:\nWrite for Spanish kids"));
    }

    #[test]
    fn blank_custom_prompt_is_ignored() {
        let msgs = build_messages("text", &request(true, Some("   ")));
        assert!(!msgs[0].content.contains("Additional Translation Instructions"));
    }

    #[test]
    fn system_prompt_override_still_gets_languages() {
        let mut req = request(false, None);
        req.system_prompt = Some("Translate {sourceLanguage} into {targetLanguage}.".into());
        let msgs = build_messages("x", &req);
        assert!(msgs[0].content.starts_with("Translate English into Spanish."));
    }

    struct Upper;

    impl Translator for Upper {
        fn translate<'a>(
            &'a self,
            markup: &'a str,
            _request: &'a TranslationRequest,
        ) -> BoxFuture<'a, Result<Translated, DocuglotError>> {
            Box::pin(async move {
                Ok(Translated {
                    markup: markup.to_uppercase(),
                    ..Default::default()
                })
            })
        }
    }

    #[tokio::test]
    async fn custom_translator_through_trait_object() {
        let t: Arc<dyn Translator> = Arc::new(Upper);
        let out = t.translate("# hola", &request(true, None)).await.unwrap();
        assert_eq!(out.markup, "# HOLA");
        assert_eq!(t.name(), "custom");
    }
}

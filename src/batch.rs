//! Batch API: run many independent jobs concurrently.
//!
//! Jobs share nothing but the configuration, so they are driven with
//! `buffer_unordered(config.concurrency)`. [`translate_batch_stream`] yields
//! each job as it finishes; [`translate_batch`] waits for all of them and
//! returns them in input order.

use crate::config::TranslationConfig;
use crate::convert::run_job;
use crate::error::DocuglotError;
use crate::output::JobOutcome;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// One finished batch entry.
#[derive(Debug)]
pub struct BatchItem {
    /// Position in the input list.
    pub index: usize,
    pub input: String,
    /// `Err` when the input could not be resolved, so no job was started.
    pub outcome: Result<JobOutcome, DocuglotError>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(outcome) if outcome.is_success())
    }
}

/// A boxed stream of finished batch entries.
pub type BatchStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Translate every input, emitting entries in completion order.
pub fn translate_batch_stream(inputs: Vec<String>, config: &TranslationConfig) -> BatchStream {
    info!(
        "Starting batch: {} documents, concurrency {}",
        inputs.len(),
        config.concurrency
    );
    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(inputs.into_iter().enumerate().map(move |(index, input_str)| {
        let cfg = config.clone();
        async move {
            let outcome =
                match input::resolve_input(&input_str, cfg.download_timeout_secs).await {
                    Ok(document) => Ok(run_job(document, &cfg).await),
                    Err(e) => Err(e),
                };
            BatchItem {
                index,
                input: input_str,
                outcome,
            }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Translate every input and return the entries in input order.
pub async fn translate_batch(inputs: Vec<String>, config: &TranslationConfig) -> Vec<BatchItem> {
    let mut items: Vec<BatchItem> = translate_batch_stream(inputs, config).collect().await;
    items.sort_by_key(|item| item.index);

    let ok = items.iter().filter(|i| i.is_success()).count();
    info!("Batch complete: {}/{} succeeded", ok, items.len());
    items
}

//! Progress-callback trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to observe a
//! job as it moves through the pipeline. The record passed to each event is a
//! snapshot, so this is also where callers persist the job: save it on
//! `on_job_created`, update it on `on_stage_complete`, finalise it on
//! `on_job_finished`.
//!
//! # Example
//!
//! ```rust
//! use docuglot::{DocumentRecord, JobProgressCallback, Stage, TranslationConfig};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Store {
//!     saved: Mutex<Vec<DocumentRecord>>,
//! }
//!
//! impl JobProgressCallback for Store {
//!     fn on_job_finished(&self, record: &DocumentRecord) {
//!         self.saved.lock().unwrap().push(record.clone());
//!     }
//! }
//!
//! let config = TranslationConfig::builder()
//!     .progress_callback(Arc::new(Store::default()) as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use crate::record::DocumentRecord;
use std::sync::Arc;

/// Called by a job as it runs.
///
/// Implementations must be `Send + Sync`: batch jobs run concurrently and
/// share one callback. All methods default to no-ops.
pub trait JobProgressCallback: Send + Sync {
    /// The record was created in `processing` state, before any stage ran.
    fn on_job_created(&self, record: &DocumentRecord) {
        let _ = record;
    }

    /// A stage is about to start.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// A stage finished and its result is on the record.
    fn on_stage_complete(&self, stage: Stage, record: &DocumentRecord) {
        let _ = (stage, record);
    }

    /// The record reached `completed` or `error`.
    fn on_job_finished(&self, record: &DocumentRecord) {
        let _ = record;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::FileType;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl JobProgressCallback for Recorder {
        fn on_job_created(&self, record: &DocumentRecord) {
            self.events.lock().unwrap().push(format!("created:{}", record.status));
        }

        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start:{stage}"));
        }

        fn on_stage_complete(&self, stage: Stage, _record: &DocumentRecord) {
            self.events.lock().unwrap().push(format!("done:{stage}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let record = DocumentRecord::new("a.pdf", FileType::Pdf, "en", "es", true, None);
        let cb = NoopProgressCallback;
        cb.on_job_created(&record);
        cb.on_stage_start(Stage::Parse);
        cb.on_stage_complete(Stage::Parse, &record);
        cb.on_job_finished(&record);
    }

    #[test]
    fn overridden_events_are_delivered_through_arc() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();
        let record = DocumentRecord::new("a.docx", FileType::Docx, "en", "fr", false, None);

        cb.on_job_created(&record);
        cb.on_stage_start(Stage::Translate);
        cb.on_stage_complete(Stage::Translate, &record);
        cb.on_job_finished(&record);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["created:processing", "start:translate", "done:translate"]
        );
    }
}

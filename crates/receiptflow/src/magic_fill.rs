//! Caller-facing entry point: extract receipt fields from an image.
//!
//! Every run that reached the pipeline hands its metadata to the ledger
//! before returning, on success and failure alike. A ledger failure is
//! logged and never changes the extraction result.

use std::sync::Arc;

use thiserror::Error;

use crate::ledger::{LedgerError, TaskLedger, TriggerType};
use crate::pipeline::{ProcessingAttemptMetadata, ProcessingError, ProcessingOutcome, ReceiptProcessor};
use crate::processor::{ImageStore, ImageStoreError, ReceiptImage};
use crate::scheduler::{Job, QueueName, SchedulerError, TaskScheduler};
use crate::settings::PromptOverrides;

#[derive(Error, Debug)]
pub enum MagicFillError {
    #[error("Failed to load receipt image: {0}")]
    Image(#[from] ImageStoreError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// Where the receipt image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes supplied by the caller. `entity_id` names what the audit rows
    /// are attached to.
    Upload { entity_id: i64, image: ReceiptImage },
    /// A previously stored receipt image, also used as the audit entity.
    Stored { receipt_image_id: i64 },
}

impl ImageSource {
    pub fn entity_id(&self) -> i64 {
        match self {
            ImageSource::Upload { entity_id, .. } => *entity_id,
            ImageSource::Stored { receipt_image_id } => *receipt_image_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MagicFillRequest {
    pub source: ImageSource,
    pub trigger: TriggerType,
    /// `None` for automated runs.
    pub ran_by_user_id: Option<i64>,
    pub overrides: PromptOverrides,
}

impl MagicFillRequest {
    pub fn upload(entity_id: i64, image: ReceiptImage) -> Self {
        Self::new(ImageSource::Upload { entity_id, image })
    }

    pub fn stored(receipt_image_id: i64) -> Self {
        Self::new(ImageSource::Stored { receipt_image_id })
    }

    fn new(source: ImageSource) -> Self {
        Self {
            source,
            trigger: TriggerType::MagicFill,
            ran_by_user_id: None,
            overrides: PromptOverrides::default(),
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerType) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.ran_by_user_id = Some(user_id);
        self
    }

    pub fn with_overrides(mut self, overrides: PromptOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Lane a background run of this request belongs to.
    pub fn queue(&self) -> QueueName {
        match self.trigger {
            TriggerType::EmailUpload => QueueName::EmailReceiptProcessing,
            TriggerType::MagicFill | TriggerType::QuickScan => QueueName::ReceiptProcessing,
        }
    }
}

pub struct MagicFillService {
    processor: Arc<ReceiptProcessor>,
    ledger: TaskLedger,
    images: Arc<dyn ImageStore>,
}

impl MagicFillService {
    pub fn new(processor: Arc<ReceiptProcessor>, ledger: TaskLedger, images: Arc<dyn ImageStore>) -> Self {
        Self {
            processor,
            ledger,
            images,
        }
    }

    pub fn run(&self, request: &MagicFillRequest) -> Result<ProcessingOutcome, MagicFillError> {
        let entity_id = request.source.entity_id();
        let _span = tracing::info_span!(
            "magic_fill",
            trigger = request.trigger.as_str(),
            entity_id,
        )
        .entered();

        let loaded;
        let image = match &request.source {
            ImageSource::Upload { image, .. } => image,
            ImageSource::Stored { receipt_image_id } => {
                loaded = self.images.load(*receipt_image_id)?;
                &loaded
            }
        };

        match self.processor.process(image, &request.overrides) {
            Ok(outcome) => {
                self.audit(&outcome.metadata, request);
                Ok(outcome)
            }
            Err(e) => {
                if let Some(metadata) = e.metadata() {
                    self.audit(metadata, request);
                }
                Err(e.into())
            }
        }
    }

    fn audit(&self, metadata: &ProcessingAttemptMetadata, request: &MagicFillRequest) {
        let entity_id = request.source.entity_id();
        match self
            .ledger
            .record_attempt(metadata, request.trigger, entity_id, request.ran_by_user_id)
        {
            Ok(tasks) => log::debug!("Audited {} stages for {} {}", tasks.len(), request.trigger, entity_id),
            Err(LedgerError::PartialWrite { written, failures }) => log::error!(
                "Audit trail for {} {} incomplete: {} written, {} failed",
                request.trigger,
                entity_id,
                written.len(),
                failures.len()
            ),
            Err(e) => log::error!(
                "Failed to audit {} {}: {}",
                request.trigger,
                entity_id,
                e
            ),
        }
    }

    /// Runs the request as a background job. `on_done` receives the result
    /// on the worker thread; a failed run is also reported to the
    /// scheduler's error sink.
    pub fn enqueue<F>(
        self: &Arc<Self>,
        scheduler: &TaskScheduler,
        request: MagicFillRequest,
        on_done: F,
    ) -> Result<String, SchedulerError>
    where
        F: FnOnce(&Result<ProcessingOutcome, MagicFillError>) + Send + 'static,
    {
        let queue = request.queue();
        let label = format!("{} {}", request.trigger, request.source.entity_id());
        let service = Arc::clone(self);
        let job = Job::new(label, move || {
            let result = service.run(&request);
            on_done(&result);
            result.map(|_| ()).map_err(|e| e.into())
        });
        scheduler.enqueue(queue, job)
    }
}

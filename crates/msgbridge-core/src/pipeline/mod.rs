//! Deadline-bounded conversion pipeline.
//!
//! One invocation handles one item, strictly in sequence:
//!
//! ```text
//! Started -> Read -> Validated -> Converted -> Uploaded -> Archived -> Done
//! ```
//!
//! The budget is checked at five checkpoints (on entry and after read,
//! validation, conversion and upload). A stage that is already running is
//! never interrupted. Validation, conversion and timeout failures move the
//! source to the failed area on a best-effort basis before the failure is
//! returned; storage failures on the success path are returned as they are.

mod deadline;
mod outcome;

pub use deadline::{Clock, Deadline, MockClock, Stage, SystemClock};
pub use outcome::{
    ConversionOutcome, ConversionReport, QuarantineOutcome, RoutingDecision, Status,
};

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{Config, Containers};
use crate::convert::MessageConverter;
use crate::error::{ConversionError, PipelineError, StorageError};
use crate::log::ConversionLog;
use crate::storage::{StorageGateway, naming};

/// Upper bound on the buffer reserved from the declared length.
const PREALLOC_LIMIT: u64 = 32 * 1024 * 1024;

/// One item delivered by the event source.
#[derive(Debug)]
pub struct InboundItem<R> {
    /// Item name in the input area.
    pub name: String,
    /// Declared length in bytes.
    pub length_bytes: u64,
    /// Content stream, read fully before validation.
    pub content: R,
}

impl<R> InboundItem<R> {
    /// Creates an inbound item.
    pub fn new(name: impl Into<String>, length_bytes: u64, content: R) -> Self {
        Self {
            name: name.into(),
            length_bytes,
            content,
        }
    }
}

/// Sequences the stages of each invocation and routes its result.
///
/// The controller holds no per-item state, so one instance can serve
/// concurrent invocations.
pub struct PipelineController {
    storage: Arc<dyn StorageGateway>,
    log: Arc<dyn ConversionLog>,
    clock: Arc<dyn Clock>,
    converter: MessageConverter,
    containers: Containers,
    budget: Duration,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("converter", &self.converter)
            .field("containers", &self.containers)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl PipelineController {
    /// Creates a controller from configuration.
    #[must_use]
    pub fn new(
        config: &Config,
        storage: Arc<dyn StorageGateway>,
        log: Arc<dyn ConversionLog>,
    ) -> Self {
        Self {
            storage,
            log,
            clock: Arc::new(SystemClock),
            converter: MessageConverter::new(config.validator()),
            containers: config.containers.clone(),
            budget: config.timeout(),
        }
    }

    /// Replaces the clock used for the deadline.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Storage area names.
    #[must_use]
    pub const fn containers(&self) -> &Containers {
        &self.containers
    }

    /// Processes one item.
    ///
    /// # Errors
    ///
    /// Returns the primary failure of the invocation. A failed quarantine
    /// move is reported through the log sink only.
    pub async fn process<R>(
        &self,
        item: InboundItem<R>,
    ) -> Result<ConversionReport, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let InboundItem {
            name,
            length_bytes,
            content,
        } = item;
        self.log.started(&name, length_bytes);
        let deadline = Deadline::start(Arc::clone(&self.clock), self.budget);

        let outcome = match self.run_stages(&name, length_bytes, content, &deadline).await {
            Ok((document, destination_name)) => ConversionOutcome::Success {
                document,
                destination_name,
            },
            Err(err) => ConversionOutcome::Failure(err),
        };

        let routing = RoutingDecision::for_outcome(&outcome);
        let result = match outcome {
            ConversionOutcome::Success {
                document,
                destination_name,
            } => self.deliver(&name, document, &destination_name, &deadline).await,
            ConversionOutcome::Failure(err) => Err(err),
        };

        match result {
            Ok((url, output_size)) => {
                let report = ConversionReport::success(
                    &name,
                    length_bytes,
                    output_size,
                    deadline.elapsed(),
                    url,
                );
                self.log.finished(&report);
                Ok(report)
            }
            Err(err) => {
                // Delivery can still fail after the stages succeeded
                let routing = match routing {
                    RoutingDecision::Deliver => RoutingDecision::for_error(&err),
                    decided => decided,
                };
                let quarantine = match routing {
                    RoutingDecision::Quarantine => self.quarantine(&name).await,
                    RoutingDecision::Deliver | RoutingDecision::Hold => {
                        QuarantineOutcome::NotAttempted
                    }
                };
                let report = ConversionReport::failure(
                    &name,
                    length_bytes,
                    deadline.elapsed(),
                    &err,
                    quarantine,
                );
                self.log.finished(&report);
                Err(err)
            }
        }
    }

    /// Read, validate, convert and pick the output name.
    async fn run_stages<R>(
        &self,
        name: &str,
        length_bytes: u64,
        mut content: R,
        deadline: &Deadline,
    ) -> Result<(Bytes, String), PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.checkpoint(name, deadline, Stage::Started)?;

        let reserve = usize::try_from(length_bytes.min(PREALLOC_LIMIT)).unwrap_or(0);
        let mut bytes = Vec::with_capacity(reserve);
        content
            .read_to_end(&mut bytes)
            .await
            .map_err(ConversionError::Read)?;
        self.checkpoint(name, deadline, Stage::Read)?;

        self.converter.validate(&bytes)?;
        self.checkpoint(name, deadline, Stage::Validated)?;

        let converted = self.converter.convert(&bytes)?;
        drop(bytes);
        if converted.attachment_count > 0 {
            self.log
                .attachments_dropped(name, converted.attachment_count);
        }
        self.checkpoint(name, deadline, Stage::Converted)?;

        let destination_name = self.output_name(name).await?;
        Ok((Bytes::from(converted.document.to_bytes()), destination_name))
    }

    /// Uploads the document and archives the source.
    async fn deliver(
        &self,
        name: &str,
        document: Bytes,
        destination_name: &str,
        deadline: &Deadline,
    ) -> Result<(String, usize), PipelineError> {
        let output_size = document.len();
        let url = self
            .storage
            .upload(&self.containers.output, destination_name, document)
            .await?;
        self.log.uploaded(name, &url);
        self.checkpoint(name, deadline, Stage::Uploaded)?;

        if let Some(archive_name) = self.relocate(RoutingDecision::Deliver, name).await? {
            self.log.archived(name, &archive_name);
        }

        Ok((url, output_size))
    }

    /// `<base>.eml`, or `<base>_<suffix>.eml` when that name is taken.
    ///
    /// The check and the later upload are not atomic; a concurrent writer
    /// can still take the name in between, and the upload then fails
    /// instead of overwriting.
    async fn output_name(&self, name: &str) -> Result<String, StorageError> {
        let candidate = naming::eml_name(name);
        if !self
            .storage
            .exists(&self.containers.output, &candidate)
            .await?
        {
            return Ok(candidate);
        }
        Ok(naming::suffixed_eml_name(name, &naming::random_suffix()))
    }

    /// Moves the source item out of the input area as `routing` dictates.
    ///
    /// Returns the new name, or `None` when the item stays in place.
    async fn relocate(
        &self,
        routing: RoutingDecision,
        name: &str,
    ) -> Result<Option<String>, StorageError> {
        let (Some(container), Some(target)) = (
            routing.source_container(&self.containers),
            routing.source_name(name, Utc::now()),
        ) else {
            return Ok(None);
        };
        self.storage
            .move_item(&self.containers.input, name, container, &target)
            .await?;
        Ok(Some(target))
    }

    /// Best-effort move of the source to the failed area.
    async fn quarantine(&self, name: &str) -> QuarantineOutcome {
        match self.relocate(RoutingDecision::Quarantine, name).await {
            Ok(Some(target)) => {
                self.log.quarantined(name, &target);
                QuarantineOutcome::Moved { name: target }
            }
            Ok(None) => QuarantineOutcome::NotAttempted,
            Err(err) => {
                self.log.quarantine_failed(name, &err);
                QuarantineOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    fn checkpoint(
        &self,
        name: &str,
        deadline: &Deadline,
        stage: Stage,
    ) -> Result<(), PipelineError> {
        let elapsed = deadline.check(stage)?;
        self.log.checkpoint(name, stage, elapsed);
        Ok(())
    }
}

//! Manual checks workflow service.
//!
//! The step and the batch id live in the option store under keys scoped by
//! site id. Both are read-modify-write without locking: two tabs advancing
//! at once race, and the last write wins. There is a single batch slot per
//! site.

use std::sync::Arc;

use openapi_client::models::{QueueItem, ScreenshotType};
use openapi_server::models::ManualChecksStatus;
use serde_json::json;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::http::api::WebChangeApi;
use crate::recovery::category::ErrorCategory;
use crate::recovery::retry::{ErrorHandler, RetryOptions};
use crate::storage::options::{keys, OptionStore};
use crate::workflow::fsm::{ManualChecksFsm, WorkflowEvent};
use crate::workflow::step::WorkflowStep;

/// Queue items requested per poll
pub const QUEUE_PAGE_SIZE: u32 = 1000;

/// Counts of a batch's queue items by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub open: u64,
    pub processing: u64,
    pub done: u64,
    pub failed: u64,
}

impl QueueSummary {
    pub fn from_items(items: &[QueueItem]) -> Self {
        use openapi_client::models::QueueStatus;

        items.iter().fold(Self::default(), |mut summary, item| {
            match item.status {
                QueueStatus::Open => summary.open += 1,
                QueueStatus::Processing => summary.processing += 1,
                QueueStatus::Done => summary.done += 1,
                QueueStatus::Failed => summary.failed += 1,
            }
            summary
        })
    }

    pub fn add(&mut self, other: &QueueSummary) {
        self.open += other.open;
        self.processing += other.processing;
        self.done += other.done;
        self.failed += other.failed;
    }

    /// No item left waiting for the remote service
    pub fn is_drained(&self) -> bool {
        self.open == 0 && self.processing == 0
    }
}

pub struct ManualChecks {
    options: Arc<dyn OptionStore>,
    api: Arc<dyn WebChangeApi>,
    errors: Arc<ErrorHandler>,
    site_id: String,
}

impl ManualChecks {
    pub fn new(
        options: Arc<dyn OptionStore>,
        api: Arc<dyn WebChangeApi>,
        errors: Arc<ErrorHandler>,
        site_id: &str,
    ) -> Self {
        Self {
            options,
            api,
            errors,
            site_id: site_id.to_string(),
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    fn step_key(&self) -> String {
        format!("{}:{}", keys::WORKFLOW_STEP, self.site_id)
    }

    fn batch_key(&self) -> String {
        format!("{}:{}", keys::BATCH_ID, self.site_id)
    }

    /// Stored step; `settings` when nothing (or garbage) is stored
    pub async fn current_step(&self) -> Result<WorkflowStep, AgentError> {
        let stored = self.options.get_string(&self.step_key()).await?;
        Ok(match stored {
            Some(value) => value.parse::<WorkflowStep>().unwrap_or_else(|e| {
                debug!("Ignoring stored workflow step: {}", e);
                WorkflowStep::Settings
            }),
            None => WorkflowStep::Settings,
        })
    }

    pub async fn batch_id(&self) -> Result<Option<String>, AgentError> {
        self.options.get_string(&self.batch_key()).await
    }

    async fn store_step(&self, step: WorkflowStep) -> Result<(), AgentError> {
        self.options.set_string(&self.step_key(), step.as_str()).await?;
        info!(site = %self.site_id, "Manual checks step: {}", step);
        Ok(())
    }

    async fn store_batch(&self, batch_id: &str) -> Result<(), AgentError> {
        self.options.set_string(&self.batch_key(), batch_id).await
    }

    async fn apply(&self, event: WorkflowEvent) -> Result<WorkflowStep, AgentError> {
        let mut fsm = ManualChecksFsm::new(self.current_step().await?);
        let step = fsm.process(event)?;
        self.store_step(step).await?;
        Ok(step)
    }

    /// Overwrite the step with `target`. Unknown values are rejected and
    /// leave the stored step alone.
    pub async fn advance_step(&self, target: &str) -> Result<WorkflowStep, AgentError> {
        let step: WorkflowStep = target
            .parse()
            .map_err(|e: String| AgentError::invalid("step", e))?;
        self.store_step(step).await?;
        Ok(step)
    }

    pub async fn start_manual_checks(&self) -> Result<WorkflowStep, AgentError> {
        self.apply(WorkflowEvent::Start).await
    }

    /// Back to `settings`. The remote batch, if any, keeps running.
    pub async fn cancel(&self) -> Result<WorkflowStep, AgentError> {
        let step = self.apply(WorkflowEvent::Cancel).await?;
        self.options.delete(&self.batch_key()).await?;
        Ok(step)
    }

    pub async fn start_new(&self) -> Result<WorkflowStep, AgentError> {
        let step = self.apply(WorkflowEvent::StartNew).await?;
        self.options.delete(&self.batch_key()).await?;
        Ok(step)
    }

    pub async fn redo_post_update(&self) -> Result<WorkflowStep, AgentError> {
        self.apply(WorkflowEvent::Redo).await
    }

    pub async fn finish_updates(&self) -> Result<WorkflowStep, AgentError> {
        self.apply(WorkflowEvent::Advance).await
    }

    /// Queue screenshots of the given type and remember the batch.
    ///
    /// `pre` and `post` also move the workflow to the matching started step;
    /// `auto` and `compare` only store the batch. On failure the step is
    /// untouched and the error carries the remote message.
    pub async fn take_screenshots(&self, sc_type: &str) -> Result<String, AgentError> {
        let sc_type: ScreenshotType = sc_type
            .parse()
            .map_err(|e: String| AgentError::invalid("sc_type", e))?;

        let group_key = match sc_type {
            ScreenshotType::Auto => keys::MONITORING_GROUP_ID,
            _ => keys::MANUAL_GROUP_ID,
        };
        let group_id = self.options.get_string(group_key).await?.ok_or_else(|| {
            AgentError::ConfigError(format!("no group configured for {} screenshots", sc_type))
        })?;

        let mut fsm = ManualChecksFsm::new(self.current_step().await?);
        let advances = matches!(sc_type, ScreenshotType::Pre | ScreenshotType::Post);
        if advances {
            fsm.process(WorkflowEvent::ScreenshotsQueued(sc_type))?;
        }

        let api = self.api.clone();
        let group = group_id.clone();
        let response = self
            .errors
            .execute_with_error_handling(
                || {
                    let api = api.clone();
                    let group = group.clone();
                    async move { api.take_screenshots(&group, sc_type).await }
                },
                &RetryOptions::new("take screenshots").with_category(ErrorCategory::Api),
            )
            .await
            .into_result()?;

        let batch_id = match (response.batch, response.message) {
            (Some(batch), _) if !batch.is_empty() => batch,
            (_, Some(message)) => {
                return Err(AgentError::ApiError {
                    status: 200,
                    message,
                })
            }
            _ => {
                return Err(AgentError::ApiError {
                    status: 200,
                    message: "The API response did not contain a batch id".to_string(),
                })
            }
        };

        self.store_batch(&batch_id).await?;
        if advances {
            self.store_step(fsm.step()).await?;
        }

        self.errors.logger().info(
            "screenshots",
            &format!("Queued {} screenshots", sc_type),
            json!({"batch": batch_id, "group": group_id}),
        );
        Ok(batch_id)
    }

    /// Status counts of the stored batch's queue, over every page
    pub async fn queue_summary(&self) -> Result<Option<QueueSummary>, AgentError> {
        let Some(batch_id) = self.batch_id().await? else {
            return Ok(None);
        };

        let mut summary = QueueSummary::default();
        let mut page_number = 1;
        loop {
            let api = self.api.clone();
            let page = self
                .errors
                .execute_with_error_handling(
                    || {
                        let api = api.clone();
                        let batch_id = batch_id.clone();
                        async move { api.get_queues(&batch_id, QUEUE_PAGE_SIZE, page_number).await }
                    },
                    &RetryOptions::new("get queues").with_category(ErrorCategory::Api),
                )
                .await
                .into_result()?;
            summary.add(&QueueSummary::from_items(&page.data));

            // An empty page ends the walk even if the meta claims more
            if page.data.is_empty() || page_number >= page.meta.last_page {
                break;
            }
            page_number += 1;
        }
        Ok(Some(summary))
    }

    /// Whether the current step may be left. Only started steps wait on the
    /// remote queue; without a stored batch there is nothing to wait for.
    pub async fn is_step_complete(&self) -> Result<bool, AgentError> {
        if !self.current_step().await?.is_started() {
            return Ok(true);
        }
        Ok(self
            .queue_summary()
            .await?
            .map(|summary| summary.is_drained())
            .unwrap_or(true))
    }

    /// The "Next" button of a started step
    pub async fn complete_started_step(&self) -> Result<WorkflowStep, AgentError> {
        if !self.is_step_complete().await? {
            return Err(AgentError::WorkflowError(
                "Screenshots are still being processed".to_string(),
            ));
        }
        self.apply(WorkflowEvent::QueueDrained).await
    }

    /// Step, batch and queue counts for the polling endpoint
    pub async fn status(&self) -> Result<ManualChecksStatus, AgentError> {
        let step = self.current_step().await?;
        let batch_id = self.batch_id().await?;
        let summary = if step.is_started() {
            self.queue_summary().await?
        } else {
            None
        };
        let counts = summary.unwrap_or_default();

        Ok(ManualChecksStatus {
            step: step.to_string(),
            batch_id,
            complete: !step.is_started() || summary.map(|s| s.is_drained()).unwrap_or(true),
            open: counts.open,
            processing: counts.processing,
            done: counts.done,
            failed: counts.failed,
        })
    }
}

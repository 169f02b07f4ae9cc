//! One test's view of one page.
//!
//! A [`ProbeSession`] attaches diagnostics collection before the first
//! navigation, runs actions, waits and inferences against the page, and
//! records every transition until [`ProbeSession::finish`] detaches the
//! collector and returns a [`SessionReport`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::action::{ActionSpec, Delivery, EventDriver};
use crate::config::HarnessConfig;
use crate::diagnostics::{DiagnosticsCollector, DiagnosticsHandle, DiagnosticsReport};
use crate::driver::PageDriver;
use crate::inference::{Inference, StateInferencer, StateLabel};
use crate::resolver::{resolve, Resolution};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::SelectorDescriptor;
use crate::transition::{TransitionLog, TransitionRecord};
use crate::wait::{
    retry_until, settle, DomCondition, RetryOptions, RetryOutcome, WaitOptions, WaitOutcome, Waiter,
};

/// Harness state for a single test
pub struct ProbeSession {
    id: Uuid,
    driver: Arc<dyn PageDriver>,
    config: HarnessConfig,
    diagnostics: DiagnosticsHandle,
    log: TransitionLog,
    started: Instant,
}

impl fmt::Debug for ProbeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("transitions", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl ProbeSession {
    /// Start a session; diagnostics are collected from this point on
    pub fn start(driver: Arc<dyn PageDriver>, config: HarnessConfig) -> Self {
        let diagnostics = DiagnosticsCollector::new()
            .capture_warnings(config.capture_warnings)
            .start(driver.as_ref());
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "probe session started");
        Self {
            id,
            driver,
            config,
            diagnostics,
            log: TransitionLog::new(),
            started: Instant::now(),
        }
    }

    /// Session id
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The page
    #[must_use]
    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Live diagnostics
    #[must_use]
    pub const fn diagnostics(&self) -> &DiagnosticsHandle {
        &self.diagnostics
    }

    /// Transitions so far
    #[must_use]
    pub const fn transitions(&self) -> &TransitionLog {
        &self.log
    }

    /// Navigate the page
    pub async fn goto(&self, url: &str) -> ProbeResult<()> {
        tracing::debug!(session = %self.id, url, "navigating");
        self.driver.navigate(url).await
    }

    /// Resolve candidate selectors
    pub async fn resolve(&self, candidates: &[SelectorDescriptor]) -> Resolution {
        resolve(self.driver.as_ref(), candidates).await
    }

    /// Perform an action without waiting or recording
    pub async fn drive(&self, action: &ActionSpec) -> ProbeResult<Delivery> {
        EventDriver::new(self.driver.as_ref()).drive(action).await
    }

    /// Wait for a condition; `None` uses the configured defaults
    pub async fn wait(&self, condition: &DomCondition, options: Option<WaitOptions>) -> WaitOutcome {
        let options = options.unwrap_or_else(|| self.config.wait_options());
        Waiter::new(self.driver.as_ref()).wait_for(condition, &options).await
    }

    /// Current inferred state
    pub async fn infer(&self, inferencer: &StateInferencer) -> Inference {
        inferencer.infer(self.driver.as_ref()).await
    }

    /// Act, then wait for `condition` (or the grace delay), then observe
    pub async fn transition(
        &mut self,
        action: &ActionSpec,
        condition: Option<(&DomCondition, Option<WaitOptions>)>,
        inferencer: &StateInferencer,
    ) -> ProbeResult<TransitionRecord> {
        let delivery = self.drive(action).await?;
        let wait = match condition {
            Some((condition, options)) => Some(self.wait(condition, options).await),
            None => {
                settle(std::time::Duration::from_millis(self.config.grace_delay_ms)).await;
                None
            }
        };
        let inference = self.infer(inferencer).await;
        let record = TransitionRecord::new(
            action.to_string(),
            delivery,
            wait,
            inference,
            self.started.elapsed(),
        );
        tracing::debug!(session = %self.id, %record, "transition");
        self.log.push(record.clone());
        Ok(record)
    }

    /// Fail unless the inferred state is one of `labels`
    pub async fn expect_state(
        &self,
        inferencer: &StateInferencer,
        labels: &[&str],
    ) -> ProbeResult<StateLabel> {
        let label = inferencer.label(self.driver.as_ref()).await;
        if label.is_one_of(labels) {
            Ok(label)
        } else {
            Err(ProbeError::UnexpectedState {
                actual: label.to_string(),
                expected: labels.join(", "),
            })
        }
    }

    /// Repeat `action` until `condition` holds; `None` uses the configured bound
    pub async fn step_until(
        &self,
        action: &ActionSpec,
        condition: &DomCondition,
        options: Option<RetryOptions>,
    ) -> ProbeResult<RetryOutcome> {
        let options = options.unwrap_or_else(|| self.config.retry_options());
        let driver = self.driver.as_ref();
        retry_until(
            || async move { EventDriver::new(driver).drive(action).await.map(|_| ()) },
            || async move { condition.evaluate(driver).await.unwrap_or(false) },
            &options,
        )
        .await
    }

    /// Detach diagnostics and summarize
    pub async fn finish(self) -> SessionReport {
        let url = self.driver.current_url().await.unwrap_or_default();
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let diagnostics = self.diagnostics.stop();
        tracing::debug!(
            session = %self.id,
            transitions = self.log.len(),
            diagnostics = diagnostics.diagnostics.len(),
            "probe session finished"
        );
        SessionReport {
            id: self.id,
            url,
            transitions: self.log,
            diagnostics,
            duration_ms,
        }
    }
}

/// Everything a session observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Session id
    pub id: Uuid,
    /// Final page URL
    pub url: String,
    /// Observed transitions
    pub transitions: TransitionLog,
    /// Collected diagnostics
    pub diagnostics: DiagnosticsReport,
    /// Wall time of the session
    pub duration_ms: u64,
}

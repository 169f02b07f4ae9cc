//! Scenario runner.
//!
//! Runs one scenario on one page:
//! - diagnostics are attached before navigation and checked at the end
//! - an action directly followed by a wait is recorded as one transition
//! - an action with no following wait gets the grace delay
//! - the first failing step stops the run; later steps are reported as skipped

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::schema::{DiagnosticsExpectation, Scenario, ScenarioError, StepSpec};
use crate::config::HarnessConfig;
use crate::diagnostics::DiagnosticsReport;
use crate::driver::PageDriver;
use crate::inference::{StateInferencer, StateLabel};
use crate::result::{ProbeError, ProbeResult};
use crate::session::ProbeSession;
use crate::transition::TransitionLog;
use crate::wait::{settle, DomCondition, RetryOptions, WaitOutcome};

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step succeeded
    Passed,
    /// Step failed and stopped the run
    Failed,
    /// Not run because an earlier step failed
    Skipped,
}

/// Result of executing a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// 1-based step number
    pub index: usize,
    /// Step description
    pub description: String,
    /// Status
    pub status: StepStatus,
    /// What happened (delivery, wait outcome, observed state)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Step execution time
    pub duration_ms: u64,
}

impl StepReport {
    /// Whether the step passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// Result of running a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Page URL
    pub url: String,
    /// Whether every step and the diagnostics expectation passed
    pub passed: bool,
    /// Per-step results
    pub steps: Vec<StepReport>,
    /// State inferred after the last step
    pub final_state: StateLabel,
    /// Observed transitions
    pub transitions: TransitionLog,
    /// Collected diagnostics
    pub diagnostics: DiagnosticsReport,
    /// Scenario-level failure (setup or diagnostics expectation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Total execution time
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// Report for a scenario that could not start
    #[must_use]
    pub fn not_started(scenario: &Scenario, error: impl Into<String>) -> Self {
        Self {
            name: scenario.name.clone(),
            url: scenario.url.clone(),
            passed: false,
            steps: scenario
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| skipped(i, step))
                .collect(),
            final_state: StateLabel::unknown(),
            transitions: TransitionLog::new(),
            diagnostics: DiagnosticsReport::default(),
            error: Some(error.into()),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// First failure message
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.steps
            .iter()
            .find_map(|s| s.error.as_deref())
            .or(self.error.as_deref())
    }

    /// Steps that passed
    #[must_use]
    pub fn passed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.passed()).count()
    }
}

fn skipped(index: usize, step: &StepSpec) -> StepReport {
    StepReport {
        index: index + 1,
        description: step.describe(),
        status: StepStatus::Skipped,
        detail: None,
        error: None,
        duration_ms: 0,
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Runs scenarios with shared harness defaults
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    config: HarnessConfig,
}

impl ScenarioRunner {
    /// Create a runner
    #[must_use]
    pub const fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Harness defaults in use
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run a scenario on a fresh page
    pub async fn run(&self, scenario: &Scenario, driver: Arc<dyn PageDriver>) -> ScenarioReport {
        let inferencer = match Self::prepare(scenario) {
            Ok(inferencer) => inferencer,
            Err(e) => {
                tracing::warn!(scenario = %scenario.name, error = %e, "scenario is invalid");
                return ScenarioReport::not_started(scenario, e.to_string());
            }
        };

        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!(scenario = %scenario.name, url = %scenario.url, "scenario started");

        let mut session = ProbeSession::start(driver, self.config.clone());
        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut error = None;

        if let Err(e) = session.goto(&scenario.url).await {
            error = Some(e.to_string());
            steps.extend(scenario.steps.iter().enumerate().map(|(i, s)| skipped(i, s)));
        } else {
            self.run_steps(scenario, &inferencer, &mut session, &mut steps).await;
        }

        let final_state = session.infer(&inferencer).await.label;
        let report = session.finish().await;

        if error.is_none() {
            if let Err(e) = check_diagnostics(&scenario.diagnostics, &report.diagnostics) {
                error = Some(e.to_string());
            }
        }

        let passed = error.is_none() && steps.iter().all(StepReport::passed);
        let duration_ms = millis(started.elapsed());
        if passed {
            tracing::info!(scenario = %scenario.name, duration_ms, "scenario passed");
        } else {
            tracing::info!(scenario = %scenario.name, duration_ms, "scenario failed");
        }

        ScenarioReport {
            name: scenario.name.clone(),
            url: scenario.url.clone(),
            passed,
            steps,
            final_state,
            transitions: report.transitions,
            diagnostics: report.diagnostics,
            error,
            started_at,
            duration_ms,
        }
    }

    fn prepare(scenario: &Scenario) -> Result<StateInferencer, ScenarioError> {
        if let Some(e) = scenario.validate().into_iter().next() {
            return Err(e);
        }
        scenario.inferencer()
    }

    async fn run_steps(
        &self,
        scenario: &Scenario,
        inferencer: &StateInferencer,
        session: &mut ProbeSession,
        reports: &mut Vec<StepReport>,
    ) {
        let steps = &scenario.steps;
        let mut i = 0;
        while i < steps.len() {
            let started = Instant::now();
            let step = &steps[i];
            tracing::debug!(step = i + 1, description = %step.describe(), "running step");

            // An action followed by a wait is one transition
            if let (StepSpec::Action(action), Some(StepSpec::Wait(wait))) = (step, steps.get(i + 1)) {
                let condition = wait.condition.to_condition(inferencer);
                let options = wait.options(self.config.wait_options());
                match session
                    .transition(action, Some((&condition, Some(options))), inferencer)
                    .await
                {
                    Ok(record) => {
                        let waited = record.wait.map_or(Duration::ZERO, |w| w.elapsed());
                        let total = started.elapsed();
                        reports.push(finished(
                            i + 1,
                            step,
                            Ok(format!("via {} -> {}", record.delivery, record.observed)),
                            millis(total.saturating_sub(waited)),
                        ));
                        let result = match record.wait {
                            Some(outcome) => wait_result(outcome, wait.optional, &condition),
                            None => Ok(String::new()),
                        };
                        let failed = result.is_err();
                        reports.push(finished(i + 2, &steps[i + 1], result, millis(waited)));
                        i += 2;
                        if failed {
                            break;
                        }
                    }
                    Err(e) => {
                        reports.push(finished(i + 1, step, Err(e), millis(started.elapsed())));
                        i += 1;
                        break;
                    }
                }
                continue;
            }

            let result = self.run_step(step, inferencer, session).await;
            let failed = result.is_err();
            reports.push(finished(i + 1, step, result, millis(started.elapsed())));
            i += 1;
            if failed {
                break;
            }
        }
        reports.extend(steps.iter().enumerate().skip(i).map(|(j, s)| skipped(j, s)));
    }

    async fn run_step(
        &self,
        step: &StepSpec,
        inferencer: &StateInferencer,
        session: &mut ProbeSession,
    ) -> ProbeResult<String> {
        match step {
            StepSpec::Goto(url) => {
                session.goto(url).await?;
                Ok(String::new())
            }
            StepSpec::Wait(wait) => {
                let condition = wait.condition.to_condition(inferencer);
                let outcome = session
                    .wait(&condition, Some(wait.options(self.config.wait_options())))
                    .await;
                wait_result(outcome, wait.optional, &condition)
            }
            StepSpec::Check(spec) => {
                let condition = spec.to_condition(inferencer);
                if condition.evaluate(session.driver()).await? {
                    Ok(String::new())
                } else {
                    Err(ProbeError::ConditionNotMet {
                        condition: condition.to_string(),
                    })
                }
            }
            StepSpec::ExpectState(labels) => {
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                let label = session.expect_state(inferencer, &labels).await?;
                Ok(format!("state {label}"))
            }
            StepSpec::Settle(ms) => {
                settle(Duration::from_millis(*ms)).await;
                Ok(String::new())
            }
            StepSpec::Retry(retry) => {
                let condition = retry.until.to_condition(inferencer);
                let options = retry.max_iterations.map(|max| RetryOptions {
                    max_iterations: max,
                    settle_ms: self.config.grace_delay_ms,
                });
                let outcome = session.step_until(&retry.action, &condition, options).await?;
                if outcome.is_completed() {
                    Ok(format!("completed after {} round(s)", outcome.iterations()))
                } else {
                    Err(ProbeError::ConditionNotMet {
                        condition: format!("{condition} within {} round(s)", outcome.iterations()),
                    })
                }
            }
            StepSpec::Action(action) => {
                let record = session.transition(action, None, inferencer).await?;
                Ok(format!("via {} -> {}", record.delivery, record.observed))
            }
        }
    }
}

fn wait_result(outcome: WaitOutcome, optional: bool, condition: &DomCondition) -> ProbeResult<String> {
    if outcome.is_fulfilled() || optional {
        Ok(outcome.to_string())
    } else {
        outcome.into_result(condition.to_string()).map(|_| String::new())
    }
}

fn finished(index: usize, step: &StepSpec, result: ProbeResult<String>, duration_ms: u64) -> StepReport {
    let (status, detail, error) = match result {
        Ok(detail) => (
            StepStatus::Passed,
            (!detail.is_empty()).then_some(detail),
            None,
        ),
        Err(e) => (StepStatus::Failed, None, Some(e.to_string())),
    };
    StepReport {
        index,
        description: step.describe(),
        status,
        detail,
        error,
        duration_ms,
    }
}

/// Check collected diagnostics against the scenario's expectation
pub fn check_diagnostics(
    expectation: &DiagnosticsExpectation,
    report: &DiagnosticsReport,
) -> ProbeResult<()> {
    match expectation {
        DiagnosticsExpectation::Any => Ok(()),
        DiagnosticsExpectation::Clean => report.assert_clean(),
        DiagnosticsExpectation::Matching(pattern) => {
            let regex = super::schema::diagnostic_pattern(pattern)
                .map_err(|e| ProbeError::config(e.to_string()))?;
            if report.errors_matching(&regex).is_empty() {
                Err(ProbeError::MissingDiagnostic {
                    pattern: pattern.clone(),
                    captured: report.errors().len(),
                })
            } else {
                Ok(())
            }
        }
    }
}

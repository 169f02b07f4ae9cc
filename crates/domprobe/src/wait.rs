//! Condition waiting and bounded retry.
//!
//! Every wait has a mandatory timeout. A timeout is an ordinary
//! [`WaitOutcome::TimedOut`] value; callers escalate it with
//! [`WaitOutcome::into_result`] when it should fail the test.
//!
//! Predicates are re-evaluated against live state on every tick and each
//! evaluation is bounded, so [`wait_until`] returns within
//! `timeout + poll_interval` even when a predicate hangs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::PageDriver;
use crate::inference::StateInferencer;
use crate::resolver::resolve;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::SelectorDescriptor;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (200ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default grace delay after an action when no condition is awaited
pub const DEFAULT_GRACE_DELAY_MS: u64 = 300;

/// Default bound for action-then-check loops
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration (at least 1ms)
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// =============================================================================
// WAIT OUTCOME
// =============================================================================

/// Result of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The predicate became true
    Fulfilled {
        /// Time from start to the successful poll
        #[serde(with = "duration_ms")]
        elapsed: Duration,
        /// Number of evaluations
        polls: u32,
    },
    /// The timeout elapsed first
    TimedOut {
        /// Time spent waiting
        #[serde(with = "duration_ms")]
        elapsed: Duration,
        /// Number of evaluations
        polls: u32,
    },
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

impl WaitOutcome {
    /// Whether the predicate became true
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    /// Time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Fulfilled { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }

    /// Number of predicate evaluations
    #[must_use]
    pub const fn polls(&self) -> u32 {
        match self {
            Self::Fulfilled { polls, .. } | Self::TimedOut { polls, .. } => *polls,
        }
    }

    /// Escalate a timeout to [`ProbeError::Timeout`]
    pub fn into_result(self, waited_for: impl Into<String>) -> ProbeResult<Duration> {
        match self {
            Self::Fulfilled { elapsed, .. } => Ok(elapsed),
            Self::TimedOut { elapsed, .. } => Err(ProbeError::Timeout {
                ms: elapsed.as_millis() as u64,
                waited_for: waited_for.into(),
            }),
        }
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fulfilled { elapsed, polls } => {
                write!(f, "fulfilled after {}ms ({polls} polls)", elapsed.as_millis())
            }
            Self::TimedOut { elapsed, polls } => {
                write!(f, "timed out after {}ms ({polls} polls)", elapsed.as_millis())
            }
        }
    }
}

/// Poll `predicate` until it returns true or the timeout elapses.
///
/// The last poll happens at the deadline. A single evaluation may run for
/// `max(remaining, poll_interval)` before it is abandoned and counted as
/// false.
pub async fn wait_until<F, Fut>(mut predicate: F, options: &WaitOptions) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let interval = options.poll_interval();
    let deadline = start + options.timeout();
    let mut polls = 0u32;

    loop {
        let budget = deadline.saturating_duration_since(Instant::now()).max(interval);
        polls += 1;
        let ok = tokio::time::timeout(budget, predicate()).await.unwrap_or_else(|_| {
            tracing::trace!(budget_ms = budget.as_millis() as u64, "predicate evaluation abandoned");
            false
        });
        tracing::trace!(polls, ok, "wait poll");
        if ok {
            return WaitOutcome::Fulfilled {
                elapsed: start.elapsed(),
                polls,
            };
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::TimedOut {
                elapsed: start.elapsed(),
                polls,
            };
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Fixed grace delay
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// =============================================================================
// DOM CONDITIONS
// =============================================================================

/// Rule over a match count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountRule {
    /// `== n`
    Exactly(usize),
    /// `>= n`
    AtLeast(usize),
    /// `<= n`
    AtMost(usize),
    /// `min <= count <= max`
    Between {
        /// Lower bound (inclusive)
        min: usize,
        /// Upper bound (inclusive)
        max: usize,
    },
}

impl CountRule {
    /// Whether the count satisfies the rule
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
            Self::AtMost(n) => count <= n,
            Self::Between { min, max } => count >= min && count <= max,
        }
    }
}

impl fmt::Display for CountRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
            Self::AtMost(n) => write!(f, "at most {n}"),
            Self::Between { min, max } => write!(f, "between {min} and {max}"),
        }
    }
}

/// Condition over live page state
#[derive(Debug, Clone)]
pub enum DomCondition {
    /// Some candidate resolves
    Exists(Vec<SelectorDescriptor>),
    /// No candidate resolves
    Absent(Vec<SelectorDescriptor>),
    /// Match count satisfies a rule
    Count {
        /// Selector counted
        selector: SelectorDescriptor,
        /// Rule
        rule: CountRule,
    },
    /// First match's text contains a substring
    TextContains {
        /// Selector
        selector: SelectorDescriptor,
        /// Substring
        text: String,
    },
    /// First match's trimmed text equals a string
    TextEquals {
        /// Selector
        selector: SelectorDescriptor,
        /// Expected text
        text: String,
    },
    /// First match's attribute equals a value
    AttributeEquals {
        /// Selector
        selector: SelectorDescriptor,
        /// Attribute name
        attribute: String,
        /// Expected value
        value: String,
    },
    /// Some match carries a class
    HasClass {
        /// Selector
        selector: SelectorDescriptor,
        /// Class
        class: String,
    },
    /// A global path equals a JSON value
    GlobalEquals {
        /// Dotted path
        path: String,
        /// Expected value
        value: Value,
    },
    /// The inferred state is one of the labels
    StateIn {
        /// Inferencer to consult
        inferencer: StateInferencer,
        /// Accepted labels
        labels: Vec<String>,
    },
}

impl DomCondition {
    /// Evaluate once
    pub async fn evaluate(&self, driver: &dyn PageDriver) -> ProbeResult<bool> {
        match self {
            Self::Exists(candidates) => Ok(resolve(driver, candidates).await.exists()),
            Self::Absent(candidates) => Ok(!resolve(driver, candidates).await.exists()),
            Self::Count { selector, rule } => Ok(rule.accepts(driver.count(selector).await?)),
            Self::TextContains { selector, text } => Ok(driver
                .element(selector, 0)
                .await?
                .is_some_and(|el| el.text().contains(text.as_str()))),
            Self::TextEquals { selector, text } => Ok(driver
                .element(selector, 0)
                .await?
                .is_some_and(|el| el.text().trim() == text)),
            Self::AttributeEquals {
                selector,
                attribute,
                value,
            } => Ok(driver
                .element(selector, 0)
                .await?
                .is_some_and(|el| el.attribute(attribute) == Some(value.as_str()))),
            Self::HasClass { selector, class } => {
                let count = driver.count(selector).await?;
                for index in 0..count {
                    if let Some(el) = driver.element(selector, index).await? {
                        if el.has_class(class) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Self::GlobalEquals { path, value } => {
                Ok(driver.read_global(path).await?.as_ref() == Some(value))
            }
            Self::StateIn { inferencer, labels } => {
                let label = inferencer.label(driver).await;
                Ok(labels.iter().any(|l| l == label.as_str()))
            }
        }
    }
}

impl fmt::Display for DomCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |c: &[SelectorDescriptor]| {
            c.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ")
        };
        match self {
            Self::Exists(c) => write!(f, "exists [{}]", join(c)),
            Self::Absent(c) => write!(f, "absent [{}]", join(c)),
            Self::Count { selector, rule } => write!(f, "count({selector}) {rule}"),
            Self::TextContains { selector, text } => write!(f, "text({selector}) contains {text:?}"),
            Self::TextEquals { selector, text } => write!(f, "text({selector}) == {text:?}"),
            Self::AttributeEquals {
                selector,
                attribute,
                value,
            } => write!(f, "{selector}@{attribute} == {value:?}"),
            Self::HasClass { selector, class } => write!(f, "{selector} has class {class}"),
            Self::GlobalEquals { path, value } => write!(f, "{path} == {value}"),
            Self::StateIn { labels, .. } => write!(f, "state in [{}]", labels.join(", ")),
        }
    }
}

/// Waits for [`DomCondition`]s on one page
#[derive(Clone, Copy)]
pub struct Waiter<'a> {
    driver: &'a dyn PageDriver,
}

impl fmt::Debug for Waiter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").finish_non_exhaustive()
    }
}

impl<'a> Waiter<'a> {
    /// Create a waiter for a page
    #[must_use]
    pub fn new(driver: &'a dyn PageDriver) -> Self {
        Self { driver }
    }

    /// Wait for a condition; evaluation errors count as "not yet"
    pub async fn wait_for(&self, condition: &DomCondition, options: &WaitOptions) -> WaitOutcome {
        let driver = self.driver;
        let outcome = wait_until(
            || async move {
                match condition.evaluate(driver).await {
                    Ok(ok) => ok,
                    Err(e) => {
                        tracing::trace!(%condition, error = %e, "condition evaluation failed");
                        false
                    }
                }
            },
            options,
        )
        .await;
        tracing::debug!(%condition, %outcome, "wait finished");
        outcome
    }
}

// =============================================================================
// RETRY LOOP
// =============================================================================

/// Options for action-then-check loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Maximum number of action/check rounds
    pub max_iterations: usize,
    /// Delay between the action and the check, in milliseconds
    pub settle_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            settle_ms: DEFAULT_GRACE_DELAY_MS,
        }
    }
}

impl RetryOptions {
    /// Create retry options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration bound
    #[must_use]
    pub const fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the settle delay
    #[must_use]
    pub const fn with_settle(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Settle delay as Duration
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Result of [`retry_until`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// The check passed after this many rounds
    Completed {
        /// Rounds run
        iterations: usize,
    },
    /// The bound was reached
    Exhausted {
        /// Rounds run
        iterations: usize,
    },
}

impl RetryOutcome {
    /// Whether the check passed
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Rounds run
    #[must_use]
    pub const fn iterations(&self) -> usize {
        match self {
            Self::Completed { iterations } | Self::Exhausted { iterations } => *iterations,
        }
    }
}

/// Run `action`, settle, run `check`; repeat until the check passes or
/// `max_iterations` rounds have run. Action errors propagate.
pub async fn retry_until<A, AFut, C, CFut>(
    mut action: A,
    mut check: C,
    options: &RetryOptions,
) -> ProbeResult<RetryOutcome>
where
    A: FnMut() -> AFut,
    AFut: Future<Output = ProbeResult<()>>,
    C: FnMut() -> CFut,
    CFut: Future<Output = bool>,
{
    for iteration in 1..=options.max_iterations {
        action().await?;
        settle(options.settle()).await;
        if check().await {
            tracing::debug!(iteration, "retry loop completed");
            return Ok(RetryOutcome::Completed { iterations: iteration });
        }
    }
    tracing::debug!(max = options.max_iterations, "retry loop exhausted");
    Ok(RetryOutcome::Exhausted {
        iterations: options.max_iterations,
    })
}

//! Page diagnostics: console errors, console warnings and uncaught
//! exceptions reported by the page under test.
//!
//! Drivers publish every diagnostic into their [`ListenerRegistry`]. A
//! [`DiagnosticsCollector`] attaches a buffering listener for the duration
//! of a session and hands back a [`DiagnosticsHandle`]. Stopping the handle
//! (or dropping it) detaches the listener, after which nothing more is
//! appended.
//!
//! Navigation is expected to happen *after* collection starts so that
//! load-time errors are captured.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::driver::PageDriver;
use crate::result::{ProbeError, ProbeResult};

/// Kind of page diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// console.error
    ConsoleError,
    /// console.warn
    ConsoleWarning,
    /// Uncaught exception (including script parse errors)
    UncaughtException,
}

impl DiagnosticKind {
    /// Whether this kind counts as an error
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::ConsoleError | Self::UncaughtException)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsoleError => write!(f, "console.error"),
            Self::ConsoleWarning => write!(f, "console.warn"),
            Self::UncaughtException => write!(f, "exception"),
        }
    }
}

/// One diagnostic reported by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Kind of diagnostic
    pub kind: DiagnosticKind,
    /// Message text
    pub message: String,
    /// Source location, when the page reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When the diagnostic was received
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    /// Create a diagnostic stamped with the current time
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a console error
    #[must_use]
    pub fn console_error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::ConsoleError, message)
    }

    /// Create a console warning
    #[must_use]
    pub fn console_warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::ConsoleWarning, message)
    }

    /// Create an uncaught exception
    #[must_use]
    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::UncaughtException, message)
    }

    /// Set source location
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

/// Receives diagnostics published by a driver
pub trait DiagnosticListener: Send + Sync {
    /// Called once per diagnostic, in arrival order
    fn on_diagnostic(&self, diagnostic: &Diagnostic);
}

/// Identifier returned by [`ListenerRegistry::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn DiagnosticListener>)>,
}

/// Set of listeners a driver publishes diagnostics to.
///
/// Cloning yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ListenerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single push or retain, so a poisoned list is still consistent.
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a listener
    pub fn attach(&self, listener: Arc<dyn DiagnosticListener>) -> ListenerId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.push((id, listener));
        id
    }

    /// Detach a listener; returns false if it was not attached
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    /// Number of attached listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Publish a diagnostic to every attached listener
    pub fn emit(&self, diagnostic: &Diagnostic) {
        // Listeners run outside the registry lock so they may attach/detach.
        let listeners: Vec<_> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        tracing::trace!(kind = %diagnostic.kind, message = %diagnostic.message, "diagnostic");
        for listener in listeners {
            listener.on_diagnostic(diagnostic);
        }
    }
}

#[derive(Debug)]
struct Buffer {
    attached: bool,
    capture_warnings: bool,
    items: Vec<Diagnostic>,
}

struct BufferListener(Arc<Mutex<Buffer>>);

impl DiagnosticListener for BufferListener {
    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        if let Ok(mut buffer) = self.0.lock() {
            if !buffer.attached {
                return;
            }
            if diagnostic.kind == DiagnosticKind::ConsoleWarning && !buffer.capture_warnings {
                return;
            }
            buffer.items.push(diagnostic.clone());
        }
    }
}

/// Starts diagnostics collection on a page
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsCollector {
    capture_warnings: bool,
}

impl DiagnosticsCollector {
    /// Create a collector that records errors and exceptions
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capture_warnings: false,
        }
    }

    /// Also record console warnings
    #[must_use]
    pub const fn capture_warnings(mut self, capture: bool) -> Self {
        self.capture_warnings = capture;
        self
    }

    /// Attach to a driver's diagnostic stream
    pub fn start(self, driver: &dyn PageDriver) -> DiagnosticsHandle {
        self.start_on(driver.listeners())
    }

    /// Attach directly to a registry
    pub fn start_on(self, registry: &ListenerRegistry) -> DiagnosticsHandle {
        let buffer = Arc::new(Mutex::new(Buffer {
            attached: true,
            capture_warnings: self.capture_warnings,
            items: Vec::new(),
        }));
        let id = registry.attach(Arc::new(BufferListener(Arc::clone(&buffer))));
        tracing::debug!(capture_warnings = self.capture_warnings, "diagnostics collection started");
        DiagnosticsHandle {
            id,
            registry: registry.clone(),
            buffer,
            started: Instant::now(),
        }
    }
}

/// Live view of collected diagnostics
pub struct DiagnosticsHandle {
    id: ListenerId,
    registry: ListenerRegistry,
    buffer: Arc<Mutex<Buffer>>,
    started: Instant,
}

impl fmt::Debug for DiagnosticsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsHandle")
            .field("id", &self.id)
            .field("collected", &self.all().len())
            .finish_non_exhaustive()
    }
}

impl DiagnosticsHandle {
    /// Every diagnostic collected so far, in arrival order
    #[must_use]
    pub fn all(&self) -> Vec<Diagnostic> {
        self.buffer.lock().map(|b| b.items.clone()).unwrap_or_default()
    }

    /// Console errors and uncaught exceptions
    #[must_use]
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.all().into_iter().filter(|d| d.kind.is_error()).collect()
    }

    /// Console warnings (empty unless warnings are captured)
    #[must_use]
    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.all()
            .into_iter()
            .filter(|d| d.kind == DiagnosticKind::ConsoleWarning)
            .collect()
    }

    /// Diagnostics whose message matches the pattern, warnings included
    #[must_use]
    pub fn matching(&self, pattern: &Regex) -> Vec<Diagnostic> {
        self.all()
            .into_iter()
            .filter(|d| pattern.is_match(&d.message))
            .collect()
    }

    /// Errors and exceptions whose message matches the pattern
    #[must_use]
    pub fn errors_matching(&self, pattern: &Regex) -> Vec<Diagnostic> {
        self.errors()
            .into_iter()
            .filter(|d| pattern.is_match(&d.message))
            .collect()
    }

    /// Whether collection is still attached
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.buffer.lock().map(|b| b.attached).unwrap_or(false)
    }

    /// Fail if any error or exception was collected
    pub fn assert_clean(&self) -> ProbeResult<()> {
        check_clean(&self.errors())
    }

    /// Require at least one error or exception matching the pattern
    pub fn expect_matching(&self, pattern: &Regex) -> ProbeResult<Diagnostic> {
        let errors = self.errors();
        errors
            .iter()
            .find(|d| pattern.is_match(&d.message))
            .cloned()
            .ok_or_else(|| ProbeError::MissingDiagnostic {
                pattern: pattern.as_str().to_string(),
                captured: errors.len(),
            })
    }

    /// Detach and return everything collected
    pub fn stop(self) -> DiagnosticsReport {
        self.detach();
        let diagnostics = self
            .buffer
            .lock()
            .map(|mut b| std::mem::take(&mut b.items))
            .unwrap_or_default();
        tracing::debug!(count = diagnostics.len(), "diagnostics collection stopped");
        DiagnosticsReport {
            diagnostics,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    /// Returns true if the listener was still attached
    fn detach(&self) -> bool {
        let was_attached = match self.buffer.lock() {
            Ok(mut b) => std::mem::replace(&mut b.attached, false),
            Err(_) => false,
        };
        self.registry.detach(self.id);
        was_attached
    }
}

impl Drop for DiagnosticsHandle {
    fn drop(&mut self) {
        if self.detach() {
            tracing::warn!("diagnostics handle dropped without stop(); listener detached");
        }
    }
}

fn check_clean(errors: &[Diagnostic]) -> ProbeResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(ProbeError::UnexpectedDiagnostics {
        count: errors.len(),
        messages: errors
            .iter()
            .map(|d| d.message.as_str())
            .collect::<Vec<_>>()
            .join("; "),
    })
}

/// Diagnostics collected over a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    /// Diagnostics in arrival order
    pub diagnostics: Vec<Diagnostic>,
    /// How long collection was attached
    pub duration_ms: u64,
}

impl DiagnosticsReport {
    /// Console errors and uncaught exceptions
    #[must_use]
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind.is_error()).collect()
    }

    /// Whether no errors were collected
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors().is_empty()
    }

    /// Fail if any error or exception was collected
    pub fn assert_clean(&self) -> ProbeResult<()> {
        let errors: Vec<Diagnostic> = self.errors().into_iter().cloned().collect();
        check_clean(&errors)
    }

    /// Diagnostics whose message matches the pattern, warnings included
    #[must_use]
    pub fn matching(&self, pattern: &Regex) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| pattern.is_match(&d.message))
            .collect()
    }

    /// Errors and exceptions whose message matches the pattern
    #[must_use]
    pub fn errors_matching(&self, pattern: &Regex) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind.is_error() && pattern.is_match(&d.message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod registry_tests {
        use super::*;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(AtomicUsize);

        impl DiagnosticListener for Counter {
            fn on_diagnostic(&self, _diagnostic: &Diagnostic) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        #[test]
        fn test_attach_emit_detach() {
            let registry = ListenerRegistry::new();
            let counter = Arc::new(Counter(AtomicUsize::new(0)));
            let id = registry.attach(counter.clone());
            assert_eq!(registry.listener_count(), 1);

            registry.emit(&Diagnostic::console_error("boom"));
            assert!(registry.detach(id));
            registry.emit(&Diagnostic::console_error("ignored"));

            assert_eq!(counter.0.load(Ordering::SeqCst), 1);
            assert_eq!(registry.listener_count(), 0);
            assert!(!registry.detach(id));
        }

        #[test]
        fn test_poisoned_registry_still_detaches() {
            let registry = ListenerRegistry::new();
            let id = registry.attach(Arc::new(Counter(AtomicUsize::new(0))));
            let inner = Arc::clone(&registry.inner);
            let _ = std::thread::spawn(move || {
                let _guard = inner.lock().unwrap();
                panic!("poison the registry");
            })
            .join();
            assert!(registry.inner.is_poisoned());

            assert_eq!(registry.listener_count(), 1);
            assert!(registry.detach(id));
            assert_eq!(registry.listener_count(), 0);
        }

        #[test]
        fn test_clones_share_listeners() {
            let registry = ListenerRegistry::new();
            let other = registry.clone();
            let counter = Arc::new(Counter(AtomicUsize::new(0)));
            registry.attach(counter.clone());
            other.emit(&Diagnostic::exception("x"));
            assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        }
    }

    mod collector_tests {
        use super::*;

        #[tokio::test]
        async fn test_collects_errors_and_exceptions_in_order() {
            let registry = ListenerRegistry::new();
            let handle = DiagnosticsCollector::new().start_on(&registry);

            registry.emit(&Diagnostic::console_error("first"));
            registry.emit(&Diagnostic::console_warning("skipped"));
            registry.emit(&Diagnostic::exception("SyntaxError: Unexpected token"));

            let all = handle.all();
            assert_eq!(all.len(), 2);
            assert_eq!(all[0].message, "first");
            assert_eq!(all[1].kind, DiagnosticKind::UncaughtException);
            assert!(handle.warnings().is_empty());
            drop(handle.stop());
        }

        #[tokio::test]
        async fn test_warnings_opt_in() {
            let registry = ListenerRegistry::new();
            let handle = DiagnosticsCollector::new()
                .capture_warnings(true)
                .start_on(&registry);
            registry.emit(&Diagnostic::console_warning("deprecated"));
            assert_eq!(handle.warnings().len(), 1);
            assert!(handle.errors().is_empty());
            assert!(handle.assert_clean().is_ok());
            let _ = handle.stop();
        }

        #[tokio::test]
        async fn test_nothing_appended_after_stop() {
            let registry = ListenerRegistry::new();
            let handle = DiagnosticsCollector::new().start_on(&registry);
            registry.emit(&Diagnostic::console_error("before"));
            let report = handle.stop();
            registry.emit(&Diagnostic::console_error("after"));

            assert_eq!(report.diagnostics.len(), 1);
            assert_eq!(registry.listener_count(), 0);
        }

        #[tokio::test]
        async fn test_pages_do_not_share_diagnostics() {
            let left = ListenerRegistry::new();
            let right = ListenerRegistry::new();
            let left_handle = DiagnosticsCollector::new().start_on(&left);
            let right_handle = DiagnosticsCollector::new().start_on(&right);

            left.emit(&Diagnostic::console_error("left only"));
            right.emit(&Diagnostic::exception("right only"));
            right.emit(&Diagnostic::console_error("right again"));

            assert_eq!(left_handle.all().len(), 1);
            assert_eq!(left_handle.all()[0].message, "left only");
            assert_eq!(right_handle.all().len(), 2);
            assert!(right_handle.all().iter().all(|d| d.message.starts_with("right")));
        }

        #[tokio::test]
        async fn test_drop_detaches() {
            let registry = ListenerRegistry::new();
            {
                let _handle = DiagnosticsCollector::new().start_on(&registry);
                assert_eq!(registry.listener_count(), 1);
            }
            assert_eq!(registry.listener_count(), 0);
        }

        #[tokio::test]
        async fn test_assert_clean_reports_messages() {
            let registry = ListenerRegistry::new();
            let handle = DiagnosticsCollector::new().start_on(&registry);
            registry.emit(&Diagnostic::console_error("bad thing"));
            let err = handle.assert_clean().unwrap_err();
            assert!(matches!(err, ProbeError::UnexpectedDiagnostics { count: 1, .. }));
            assert!(err.to_string().contains("bad thing"));
            let _ = handle.stop();
        }

        #[tokio::test]
        async fn test_expect_matching() {
            let registry = ListenerRegistry::new();
            let handle = DiagnosticsCollector::new().start_on(&registry);
            registry.emit(&Diagnostic::exception("SyntaxError: missing ) after argument list"));

            let syntax = Regex::new("(?i)syntax").unwrap();
            assert!(handle.expect_matching(&syntax).is_ok());
            assert_eq!(handle.matching(&syntax).len(), 1);

            let other = Regex::new("TypeError").unwrap();
            let err = handle.expect_matching(&other).unwrap_err();
            assert!(matches!(err, ProbeError::MissingDiagnostic { captured: 1, .. }));
            let _ = handle.stop();
        }

        #[tokio::test]
        async fn test_expect_matching_ignores_warnings() {
            let registry = ListenerRegistry::new();
            let handle = DiagnosticsCollector::new()
                .capture_warnings(true)
                .start_on(&registry);
            registry.emit(&Diagnostic::console_warning("Unexpected value for speed, using 1"));

            let pattern = Regex::new("(?i)syntax|unexpected").unwrap();
            assert_eq!(handle.matching(&pattern).len(), 1);
            assert!(handle.errors_matching(&pattern).is_empty());
            let err = handle.expect_matching(&pattern).unwrap_err();
            assert!(matches!(err, ProbeError::MissingDiagnostic { captured: 0, .. }));

            registry.emit(&Diagnostic::exception("SyntaxError: Unexpected token '}'"));
            assert_eq!(handle.expect_matching(&pattern).unwrap().kind, DiagnosticKind::UncaughtException);
            let _ = handle.stop();
        }
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_report_errors_matching_skips_warnings() {
            let report = DiagnosticsReport {
                diagnostics: vec![
                    Diagnostic::console_warning("unexpected speed"),
                    Diagnostic::console_error("Unexpected end of input"),
                ],
                duration_ms: 5,
            };
            let pattern = Regex::new("(?i)unexpected").unwrap();
            assert_eq!(report.matching(&pattern).len(), 2);
            let errors = report.errors_matching(&pattern);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].kind, DiagnosticKind::ConsoleError);
        }

        #[test]
        fn test_report_clean_ignores_warnings() {
            let report = DiagnosticsReport {
                diagnostics: vec![Diagnostic::console_warning("meh")],
                duration_ms: 5,
            };
            assert!(report.is_clean());
            assert!(report.assert_clean().is_ok());
        }

        #[test]
        fn test_report_serializes_kind_snake_case() {
            let report = DiagnosticsReport {
                diagnostics: vec![Diagnostic::exception("x").with_source("app.js:3")],
                duration_ms: 0,
            };
            let json = serde_json::to_string(&report).unwrap();
            assert!(json.contains("uncaught_exception"));
            assert!(json.contains("app.js:3"));
        }

        #[test]
        fn test_display() {
            let d = Diagnostic::console_error("oops").with_source("main.js:1");
            assert_eq!(d.to_string(), "[console.error] oops (main.js:1)");
        }
    }
}

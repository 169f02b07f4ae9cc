//! domprobe: resilient probing of live web pages
//!
//! A test harness for browser-hosted state machines whose implementation
//! details are unknown or unstable. Tests describe elements by ordered
//! fallback selectors, infer the application's state from whatever evidence
//! the page exposes, deliver interactions through a chain of strategies,
//! wait for DOM conditions by polling, and collect the page's console errors
//! and uncaught exceptions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Scenario    │──►│ ProbeSession │──►│  PageDriver  │──► Chromium (CDP)
//! │  (YAML)      │   │              │   │  (trait)     │──► MockPage
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!          resolver · event driver · waiter · inferencer · diagnostics
//! ```
//!
//! Every component talks to the page through [`PageDriver`], so the whole
//! harness runs against [`MockPage`] in unit tests and against
//! [`browser::ChromiumPage`] (feature `browser`) for real pages.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_frames))]

pub mod action;
#[cfg(feature = "browser")]
pub mod browser;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod event;
pub mod inference;
pub mod mock;
pub mod resolver;
mod result;
pub mod scenario;
pub mod selector;
pub mod session;
pub mod transition;
pub mod wait;
pub mod yaml;

pub use action::{ActionSpec, Delivery, DeliveryStrategy, EventDriver, EventTarget, Fallback};
pub use config::HarnessConfig;
pub use diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticListener, DiagnosticsCollector, DiagnosticsHandle,
    DiagnosticsReport, ListenerId, ListenerRegistry,
};
pub use driver::{ElementHandle, PageDriver};
pub use event::{DispatchTarget, KeyChord, KeyModifiers, SyntheticEvent};
pub use inference::{
    AttributeProbe, ClassProbe, CountProbe, Evidence, EvidenceProbe, GlobalStateProbe, Inference,
    ScriptProbe, StateInferencer, StateLabel, TextProbe,
};
pub use mock::{MockDocument, MockElement, MockInteraction, MockPage};
pub use resolver::{resolve, resolve_strs, Attempt, AttemptOutcome, Resolution};
pub use result::{ProbeError, ProbeResult};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner};
pub use selector::{AttributeOp, SelectorDescriptor};
pub use session::{ProbeSession, SessionReport};
pub use transition::{TransitionLog, TransitionRecord};
pub use wait::{
    retry_until, settle, wait_until, CountRule, DomCondition, RetryOptions, RetryOutcome,
    WaitOptions, WaitOutcome, Waiter,
};

#[cfg(feature = "browser")]
pub use browser::{ChromiumBrowser, ChromiumConfig, ChromiumPage};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        ActionSpec, ClassProbe, CountProbe, CountRule, Delivery, DeliveryStrategy,
        DiagnosticsCollector, DomCondition, EventTarget, Fallback, GlobalStateProbe,
        HarnessConfig, KeyChord, MockElement, MockPage, PageDriver, ProbeError, ProbeResult,
        ProbeSession, SelectorDescriptor, StateInferencer, StateLabel, TextProbe, WaitOptions,
        WaitOutcome,
    };
    pub use super::{Scenario, ScenarioRunner};

    #[cfg(feature = "browser")]
    pub use super::{ChromiumBrowser, ChromiumConfig, ChromiumPage};
}

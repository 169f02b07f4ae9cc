//! PageDriver - the seam between the harness and a live page.
//!
//! Everything above this trait (resolution, inference, delivery, waiting,
//! diagnostics) is written against `dyn PageDriver`. Two implementations
//! ship with the crate:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PageDriver (object-safe async trait)                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────┐     ┌──────────────────────────┐  │
//! │  │  ChromiumPage         │     │  MockPage                │  │
//! │  │  (feature "browser")  │     │  (always available)      │  │
//! │  │  CDP via chromiumoxide│     │  in-memory document      │  │
//! │  └───────────────────────┘     └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods take `&self`; drivers are shared as `Arc<dyn PageDriver>` and
//! use interior mutability where they need it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::diagnostics::ListenerRegistry;
use crate::event::{DispatchTarget, KeyChord, SyntheticEvent};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::SelectorDescriptor;

/// Snapshot of a matched element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Selector that matched (display form)
    pub selector: String,
    /// Position among that selector's matches
    pub index: usize,
    /// Lower-case tag name
    pub tag_name: String,
    /// Text content
    pub text_content: Option<String>,
    /// Class list
    #[serde(default)]
    pub classes: Vec<String>,
    /// Attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(selector: impl Into<String>, index: usize, tag_name: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            index,
            tag_name: tag_name.into(),
            text_content: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Check for a class
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Text content, or empty
    #[must_use]
    pub fn text(&self) -> &str {
        self.text_content.as_deref().unwrap_or_default()
    }
}

/// Abstract page under test
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to settle
    async fn navigate(&self, url: &str) -> ProbeResult<()>;

    /// Current URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Number of elements matching a selector
    async fn count(&self, selector: &SelectorDescriptor) -> ProbeResult<usize>;

    /// The `index`-th match, if any
    async fn element(
        &self,
        selector: &SelectorDescriptor,
        index: usize,
    ) -> ProbeResult<Option<ElementHandle>>;

    /// Read a dotted path under the page's global object.
    ///
    /// `None` when any segment is missing, the value is `undefined`, or a
    /// getter throws.
    async fn read_global(&self, path: &str) -> ProbeResult<Option<Value>>;

    /// Evaluate a script and return its JSON value
    async fn evaluate(&self, script: &str) -> ProbeResult<Value>;

    /// Trusted click on an element
    async fn click(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Replace an input's value
    async fn fill(&self, element: &ElementHandle, value: &str) -> ProbeResult<()>;

    /// Drag one element onto another
    async fn drag(&self, from: &ElementHandle, to: &ElementHandle) -> ProbeResult<()>;

    /// Trusted key press on the focused element
    async fn press_key(&self, chord: &KeyChord) -> ProbeResult<()>;

    /// Construct and dispatch an event; `false` if the target is gone
    async fn dispatch_event(
        &self,
        target: &DispatchTarget,
        event: &SyntheticEvent,
    ) -> ProbeResult<bool>;

    /// Call `object.method(...args)`; `false` if it is not callable
    async fn call_method(&self, object: &str, method: &str, args: &[Value]) -> ProbeResult<bool>;

    /// Diagnostics published by this page
    fn listeners(&self) -> &ListenerRegistry;

    /// Release the page
    async fn close(&self) -> ProbeResult<()> {
        Ok(())
    }
}

/// Split a dotted global path into segments.
///
/// Segments are identifiers or array indices; `window.` / `globalThis.`
/// prefixes are accepted and dropped.
pub fn global_path_segments(path: &str) -> ProbeResult<Vec<&str>> {
    let trimmed = path.trim();
    let trimmed = trimmed
        .strip_prefix("window.")
        .or_else(|| trimmed.strip_prefix("globalThis."))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(ProbeError::config("empty global path"));
    }
    let segments: Vec<&str> = trimmed.split('.').collect();
    for segment in &segments {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !valid {
            return Err(ProbeError::config(format!(
                "invalid global path '{path}': bad segment '{segment}'"
            )));
        }
    }
    Ok(segments)
}

//! UI actions with synthetic-event fallback.
//!
//! DOM-addressable actions (click, fill, drag) resolve their targets through
//! the [`crate::resolver`]. When nothing resolves, or the trusted
//! interaction fails, the action's [`Fallback`] strategies are tried in
//! order. The first strategy that delivers wins; if none does the call
//! fails with [`ProbeError::ActionUndeliverable`].
//!
//! Each call performs at most one interaction and never waits for the page
//! to settle.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::driver::{ElementHandle, PageDriver};
use crate::event::{DispatchTarget, KeyChord, SyntheticEvent};
use crate::resolver::resolve;
use crate::result::{ProbeError, ProbeResult};
use crate::selector::SelectorDescriptor;

/// Where a synthetic strategy dispatches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTarget {
    /// `document`
    #[default]
    Document,
    /// `window`
    Window,
    /// First element resolved from candidates
    Element(Vec<SelectorDescriptor>),
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Window => write!(f, "window"),
            Self::Element(candidates) => write!(f, "{}", describe_candidates(candidates)),
        }
    }
}

fn default_pointer_event() -> String {
    "click".to_string()
}

/// One synthetic way of delivering an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStrategy {
    /// `window.<object>.<method>(event, detail)`, when callable
    MethodCall {
        /// Dotted global path of the receiver
        object: String,
        /// Method name
        method: String,
    },
    /// `new CustomEvent(event, { detail })`
    CustomEvent {
        /// Dispatch target
        #[serde(default)]
        target: EventTarget,
    },
    /// `new KeyboardEvent("keydown", { key })`
    KeyboardEvent {
        /// Dispatch target
        #[serde(default)]
        target: EventTarget,
        /// `event.key`
        key: String,
    },
    /// `new PointerEvent(name)`
    PointerEvent {
        /// Dispatch target
        #[serde(default)]
        target: EventTarget,
        /// Event type
        #[serde(default = "default_pointer_event")]
        name: String,
    },
}

impl DeliveryStrategy {
    /// Method call strategy
    #[must_use]
    pub fn method(object: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodCall {
            object: object.into(),
            method: method.into(),
        }
    }

    /// Custom event strategy
    #[must_use]
    pub const fn custom_event(target: EventTarget) -> Self {
        Self::CustomEvent { target }
    }

    /// Keyboard event strategy
    #[must_use]
    pub fn keyboard_event(target: EventTarget, key: impl Into<String>) -> Self {
        Self::KeyboardEvent {
            target,
            key: key.into(),
        }
    }

    /// Pointer click strategy
    #[must_use]
    pub fn pointer_event(target: EventTarget) -> Self {
        Self::PointerEvent {
            target,
            name: default_pointer_event(),
        }
    }
}

impl fmt::Display for DeliveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodCall { object, method } => write!(f, "method {object}.{method}"),
            Self::CustomEvent { target } => write!(f, "CustomEvent on {target}"),
            Self::KeyboardEvent { target, key } => write!(f, "KeyboardEvent({key}) on {target}"),
            Self::PointerEvent { target, name } => write!(f, "PointerEvent({name}) on {target}"),
        }
    }
}

/// Synthetic delivery used when the DOM path is unavailable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    /// Logical event name passed to methods and custom events
    pub event: String,
    /// Payload passed along with the event
    #[serde(default)]
    pub detail: Value,
    /// Strategies, in order
    pub strategies: Vec<DeliveryStrategy>,
}

impl Fallback {
    /// Create a fallback with no strategies
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            detail: Value::Null,
            strategies: Vec::new(),
        }
    }

    /// Set the payload
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// Append a strategy
    #[must_use]
    pub fn then(mut self, strategy: DeliveryStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }
}

/// A UI action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSpec {
    /// Trusted click on the first resolved target
    Click {
        /// Candidate selectors
        target: Vec<SelectorDescriptor>,
        /// Synthetic fallback
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Fallback>,
    },
    /// Replace an input's value
    Fill {
        /// Candidate selectors
        target: Vec<SelectorDescriptor>,
        /// New value
        value: String,
        /// Synthetic fallback
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Fallback>,
    },
    /// Trusted key press; the keyboard is always addressable
    #[serde(alias = "press")]
    Keypress {
        /// Key and modifiers, e.g. `Control+z`
        key: KeyChord,
    },
    /// Drag one element onto another
    Drag {
        /// Candidate sources
        from: Vec<SelectorDescriptor>,
        /// Candidate drop targets
        to: Vec<SelectorDescriptor>,
        /// Synthetic fallback
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Fallback>,
    },
    /// Synthetic event only (no DOM path)
    #[serde(rename = "dispatch", alias = "synthetic_event")]
    SyntheticEvent {
        /// Logical event name
        event: String,
        /// Payload
        #[serde(default)]
        detail: Value,
        /// Strategies; a CustomEvent on the document when empty
        #[serde(default)]
        strategies: Vec<DeliveryStrategy>,
    },
}

impl ActionSpec {
    /// Click without fallback
    #[must_use]
    pub fn click(target: Vec<SelectorDescriptor>) -> Self {
        Self::Click {
            target,
            fallback: None,
        }
    }

    /// Click with a synthetic fallback
    #[must_use]
    pub fn click_or(target: Vec<SelectorDescriptor>, fallback: Fallback) -> Self {
        Self::Click {
            target,
            fallback: Some(fallback),
        }
    }

    /// Key press
    #[must_use]
    pub const fn keypress(key: KeyChord) -> Self {
        Self::Keypress { key }
    }

    /// Synthetic event with default delivery
    #[must_use]
    pub fn dispatch(event: impl Into<String>) -> Self {
        Self::SyntheticEvent {
            event: event.into(),
            detail: Value::Null,
            strategies: Vec::new(),
        }
    }
}

fn describe_candidates(candidates: &[SelectorDescriptor]) -> String {
    let items: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(" | "))
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click { target, .. } => write!(f, "click {}", describe_candidates(target)),
            Self::Fill { target, value, .. } => {
                write!(f, "fill {} = {value:?}", describe_candidates(target))
            }
            Self::Keypress { key } => write!(f, "press {key}"),
            Self::Drag { from, to, .. } => write!(
                f,
                "drag {} -> {}",
                describe_candidates(from),
                describe_candidates(to)
            ),
            Self::SyntheticEvent { event, .. } => write!(f, "dispatch {event}"),
        }
    }
}

/// How an action was delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Delivery {
    /// Trusted interaction on a resolved element
    Dom {
        /// Winning selector
        selector: String,
    },
    /// Trusted key press
    Keyboard {
        /// Chord pressed
        chord: String,
    },
    /// A fallback strategy
    Synthetic {
        /// Strategy that delivered
        strategy: String,
    },
}

impl Delivery {
    /// Whether a synthetic strategy was used
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic { .. })
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom { selector } => write!(f, "dom {selector}"),
            Self::Keyboard { chord } => write!(f, "keyboard {chord}"),
            Self::Synthetic { strategy } => write!(f, "synthetic {strategy}"),
        }
    }
}

/// Performs actions on one page
#[derive(Clone, Copy)]
pub struct EventDriver<'a> {
    driver: &'a dyn PageDriver,
}

impl fmt::Debug for EventDriver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDriver").finish_non_exhaustive()
    }
}

impl<'a> EventDriver<'a> {
    /// Create an event driver for a page
    #[must_use]
    pub fn new(driver: &'a dyn PageDriver) -> Self {
        Self { driver }
    }

    /// Perform an action
    pub async fn drive(&self, action: &ActionSpec) -> ProbeResult<Delivery> {
        let description = action.to_string();
        let mut tried = Vec::new();

        match action {
            ActionSpec::Click { target, fallback } => {
                if let Some((selector, el)) = self.target(target, &mut tried).await {
                    match self.driver.click(&el).await {
                        Ok(()) => return Ok(Delivery::Dom { selector }),
                        Err(e) => self.dom_failed(&selector, &e, &mut tried),
                    }
                }
                self.fallback(&description, fallback.as_ref(), tried).await
            }
            ActionSpec::Fill {
                target,
                value,
                fallback,
            } => {
                if let Some((selector, el)) = self.target(target, &mut tried).await {
                    match self.driver.fill(&el, value).await {
                        Ok(()) => return Ok(Delivery::Dom { selector }),
                        Err(e) => self.dom_failed(&selector, &e, &mut tried),
                    }
                }
                let fallback = fallback.clone().map(|mut f| {
                    if f.detail.is_null() {
                        f.detail = json!({ "value": value });
                    }
                    f
                });
                self.fallback(&description, fallback.as_ref(), tried).await
            }
            ActionSpec::Drag { from, to, fallback } => {
                let source = self.target(from, &mut tried).await;
                let dest = self.target(to, &mut tried).await;
                if let (Some((source_sel, source_el)), Some((dest_sel, dest_el))) = (source, dest) {
                    let selector = format!("{source_sel} -> {dest_sel}");
                    match self.driver.drag(&source_el, &dest_el).await {
                        Ok(()) => return Ok(Delivery::Dom { selector }),
                        Err(e) => self.dom_failed(&selector, &e, &mut tried),
                    }
                }
                self.fallback(&description, fallback.as_ref(), tried).await
            }
            ActionSpec::Keypress { key } => match self.driver.press_key(key).await {
                Ok(()) => Ok(Delivery::Keyboard {
                    chord: key.to_string(),
                }),
                Err(e) => Err(ProbeError::ActionUndeliverable {
                    action: description,
                    tried: format!("keyboard ({e})"),
                }),
            },
            ActionSpec::SyntheticEvent {
                event,
                detail,
                strategies,
            } => {
                let strategies = if strategies.is_empty() {
                    vec![DeliveryStrategy::custom_event(EventTarget::Document)]
                } else {
                    strategies.clone()
                };
                let fallback = Fallback {
                    event: event.clone(),
                    detail: detail.clone(),
                    strategies,
                };
                self.fallback(&description, Some(&fallback), tried).await
            }
        }
    }

    async fn target(
        &self,
        candidates: &[SelectorDescriptor],
        tried: &mut Vec<String>,
    ) -> Option<(String, ElementHandle)> {
        let resolution = resolve(self.driver, candidates).await;
        let selector = resolution.selector().map(ToString::to_string);
        match (selector, resolution.into_element()) {
            (Some(selector), Some(el)) => Some((selector, el)),
            _ => {
                tried.push(format!("dom {}", describe_candidates(candidates)));
                None
            }
        }
    }

    fn dom_failed(&self, selector: &str, error: &ProbeError, tried: &mut Vec<String>) {
        tracing::debug!(selector, %error, "trusted interaction failed, trying fallback");
        tried.push(format!("dom {selector} ({error})"));
    }

    async fn fallback(
        &self,
        description: &str,
        fallback: Option<&Fallback>,
        mut tried: Vec<String>,
    ) -> ProbeResult<Delivery> {
        if let Some(fallback) = fallback {
            for strategy in &fallback.strategies {
                match self.deliver(fallback, strategy).await {
                    Ok(true) => {
                        tracing::debug!(action = description, %strategy, "delivered via fallback");
                        return Ok(Delivery::Synthetic {
                            strategy: strategy.to_string(),
                        });
                    }
                    Ok(false) => tried.push(strategy.to_string()),
                    Err(e) => {
                        tracing::debug!(%strategy, error = %e, "delivery strategy failed");
                        tried.push(format!("{strategy} ({e})"));
                    }
                }
            }
        }
        Err(ProbeError::ActionUndeliverable {
            action: description.to_string(),
            tried: if tried.is_empty() {
                "nothing".to_string()
            } else {
                tried.join(", ")
            },
        })
    }

    async fn deliver(&self, fallback: &Fallback, strategy: &DeliveryStrategy) -> ProbeResult<bool> {
        let (target, event) = match strategy {
            DeliveryStrategy::MethodCall { object, method } => {
                let args = [json!(fallback.event), fallback.detail.clone()];
                return self.driver.call_method(object, method, &args).await;
            }
            DeliveryStrategy::CustomEvent { target } => (
                target,
                SyntheticEvent::custom_with_detail(&fallback.event, fallback.detail.clone()),
            ),
            DeliveryStrategy::KeyboardEvent { target, key } => {
                (target, SyntheticEvent::keydown(key.as_str()))
            }
            DeliveryStrategy::PointerEvent { target, name } => {
                (target, SyntheticEvent::pointer(name.as_str()))
            }
        };
        let dispatch_target = match target {
            EventTarget::Document => DispatchTarget::Document,
            EventTarget::Window => DispatchTarget::Window,
            EventTarget::Element(candidates) => match resolve(self.driver, candidates).await.into_element() {
                Some(el) => DispatchTarget::Element(el),
                None => return Ok(false),
            },
        };
        self.driver.dispatch_event(&dispatch_target, &event).await
    }
}

//! In-memory page for exercising the harness without a browser.
//!
//! [`MockPage`] holds a flat, ordered list of [`MockElement`]s (with
//! optional parent links), a JSON global object, and scripted reactions
//! that mutate the document when the harness clicks, presses keys,
//! dispatches events or calls page methods. Reactions can also be
//! scheduled on the tokio clock, which lets timing tests run under
//! `start_paused = true`.
//!
//! Selector support: CSS compounds (`tag`, `#id`, `.class`,
//! `[attr op value]`, `:not(...)`) joined by descendant or `>` combinators
//! and comma lists, plus every [`SelectorDescriptor`] variant except XPath.
//!
//! ```
//! use domprobe::mock::{MockElement, MockPage};
//!
//! let page = MockPage::new();
//! page.with_document(|doc| {
//!     doc.add(MockElement::new("button").with_id("start").with_text("Start"));
//! });
//! page.on_click("#start", |doc| {
//!     doc.set_global("app.state", serde_json::json!("running"));
//! });
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::diagnostics::{Diagnostic, ListenerRegistry};
use crate::driver::{global_path_segments, ElementHandle, PageDriver};
use crate::event::{DispatchTarget, KeyChord, SyntheticEvent};
use crate::result::{ProbeError, ProbeResult};
use crate::selector::{role_css, AttributeOp, SelectorDescriptor, NON_TEXT_TAGS};

/// Document mutation run by a reaction
pub type Reaction = Arc<dyn Fn(&mut MockDocument) + Send + Sync>;

type ScriptFn = Arc<dyn Fn(&MockDocument) -> Value + Send + Sync>;

/// Index of an element in a [`MockDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One element of the mock document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Lower-case tag name
    pub tag: String,
    /// Class list
    pub classes: Vec<String>,
    /// Attributes (including `id` and `value`)
    pub attributes: BTreeMap<String, String>,
    /// Text content
    pub text: String,
    /// Whether trusted clicks reach it
    pub interactive: bool,
    parent: Option<NodeId>,
    removed: bool,
}

impl MockElement {
    /// Create an element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            interactive: true,
            parent: None,
            removed: false,
        }
    }

    /// Set `id`
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    /// Add a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Present in the DOM but unreachable by trusted clicks (covered,
    /// zero-size, pointer-events: none)
    #[must_use]
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    /// Attribute lookup; `class` is synthesised from the class list
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        if name == "class" && !self.classes.is_empty() {
            return Some(self.classes.join(" "));
        }
        self.attributes.get(name).cloned()
    }

    /// aria-label, then text, then value
    #[must_use]
    pub fn accessible_name(&self) -> String {
        self.attributes
            .get("aria-label")
            .cloned()
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.text.clone()).filter(|s| !s.trim().is_empty()))
            .or_else(|| self.attributes.get("value").cloned())
            .unwrap_or_default()
    }
}

/// Mutable state of a [`MockPage`]
#[derive(Debug, Default)]
pub struct MockDocument {
    elements: Vec<MockElement>,
    globals: Map<String, Value>,
    pending: Vec<Diagnostic>,
}

impl MockDocument {
    /// Append a top-level element
    pub fn add(&mut self, element: MockElement) -> NodeId {
        self.elements.push(element);
        NodeId(self.elements.len() - 1)
    }

    /// Append an element under a parent
    pub fn add_child(&mut self, parent: NodeId, mut element: MockElement) -> NodeId {
        element.parent = Some(parent);
        self.add(element)
    }

    /// Element by id, if still attached
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&MockElement> {
        self.is_attached(node).then(|| &self.elements[node.0])
    }

    /// Mutable element by id, if still attached
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut MockElement> {
        if self.is_attached(node) {
            self.elements.get_mut(node.0)
        } else {
            None
        }
    }

    /// Number of attached elements
    #[must_use]
    pub fn len(&self) -> usize {
        (0..self.elements.len())
            .filter(|&i| self.is_attached(NodeId(i)))
            .count()
    }

    /// Whether no elements are attached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attached elements matching a CSS selector, in document order
    pub fn query(&self, css: &str) -> ProbeResult<Vec<NodeId>> {
        let list = parse_css(css).map_err(|reason| ProbeError::invalid_selector(css, reason))?;
        Ok(self
            .attached()
            .filter(|&node| list.iter().any(|c| self.matches_complex(node, c)))
            .collect())
    }

    /// Attached elements matching a descriptor, in document order
    pub fn select(&self, selector: &SelectorDescriptor) -> ProbeResult<Vec<NodeId>> {
        match selector {
            SelectorDescriptor::XPath(path) => Err(ProbeError::invalid_selector(
                path,
                "XPath is not supported by MockPage",
            )),
            SelectorDescriptor::Unparsed { raw, reason } => {
                Err(ProbeError::invalid_selector(raw, reason))
            }
            SelectorDescriptor::Text(text) => Ok(self.innermost_with_text(text)),
            SelectorDescriptor::CssWithText { css, text } => {
                let needle = text.to_lowercase();
                Ok(self
                    .query(css)?
                    .into_iter()
                    .filter(|&n| self.renders_text(n))
                    .filter(|&n| self.elements[n.0].text.to_lowercase().contains(&needle))
                    .collect())
            }
            SelectorDescriptor::Role {
                role,
                name: Some(name),
            } => {
                let needle = name.to_lowercase();
                Ok(self
                    .query(&role_css(role))?
                    .into_iter()
                    .filter(|&n| {
                        self.elements[n.0]
                            .accessible_name()
                            .trim()
                            .to_lowercase()
                            .contains(&needle)
                    })
                    .collect())
            }
            other => {
                let css = other.to_css().unwrap_or_default();
                self.query(&css)
            }
        }
    }

    /// Whether an element matches a CSS selector; false for invalid CSS
    #[must_use]
    pub fn matches(&self, node: NodeId, css: &str) -> bool {
        match parse_css(css) {
            Ok(list) => self.is_attached(node) && list.iter().any(|c| self.matches_complex(node, c)),
            Err(_) => false,
        }
    }

    /// Run `f` on every element matching `css`; returns how many matched
    pub fn update(&mut self, css: &str, mut f: impl FnMut(&mut MockElement)) -> usize {
        let nodes = self.query(css).unwrap_or_default();
        for node in &nodes {
            f(&mut self.elements[node.0]);
        }
        nodes.len()
    }

    /// Add a class to every match
    pub fn add_class(&mut self, css: &str, class: &str) -> usize {
        self.update(css, |el| {
            if !el.classes.iter().any(|c| c == class) {
                el.classes.push(class.to_string());
            }
        })
    }

    /// Remove a class from every match
    pub fn remove_class(&mut self, css: &str, class: &str) -> usize {
        self.update(css, |el| el.classes.retain(|c| c != class))
    }

    /// Set text on every match
    pub fn set_text(&mut self, css: &str, text: &str) -> usize {
        self.update(css, |el| el.text = text.to_string())
    }

    /// Set an attribute on every match
    pub fn set_attr(&mut self, css: &str, name: &str, value: &str) -> usize {
        self.update(css, |el| {
            el.attributes.insert(name.to_string(), value.to_string());
        })
    }

    /// Detach every match (and its descendants)
    pub fn remove(&mut self, css: &str) -> usize {
        self.update(css, |el| el.removed = true)
    }

    /// Set a dotted global path, creating intermediate objects
    pub fn set_global(&mut self, path: &str, value: Value) {
        let Ok(segments) = global_path_segments(path) else {
            return;
        };
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut map = &mut self.globals;
        for segment in parents {
            let entry = map
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry {
                Value::Object(inner) => map = inner,
                _ => return,
            }
        }
        map.insert((*last).to_string(), value);
    }

    /// Read a dotted global path
    #[must_use]
    pub fn global(&self, path: &str) -> Option<&Value> {
        let segments = global_path_segments(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut current = self.globals.get(*first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(*segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Remove a top-level global
    pub fn remove_global(&mut self, name: &str) -> Option<Value> {
        self.globals.remove(name)
    }

    /// Report `console.error(message)`
    pub fn console_error(&mut self, message: impl Into<String>) {
        self.pending.push(Diagnostic::console_error(message));
    }

    /// Report `console.warn(message)`
    pub fn console_warning(&mut self, message: impl Into<String>) {
        self.pending.push(Diagnostic::console_warning(message));
    }

    /// Report an uncaught exception
    pub fn throw_exception(&mut self, message: impl Into<String>) {
        self.pending.push(Diagnostic::exception(message));
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            match self.elements.get(n.0) {
                Some(el) if !el.removed => current = el.parent,
                _ => return false,
            }
        }
        true
    }

    fn attached(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.elements.len())
            .map(NodeId)
            .filter(|&n| self.is_attached(n))
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.elements[node.0].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.elements[p.0].parent;
        }
        false
    }

    /// False inside `<script>`, `<style>`, `<template>` and `<noscript>`
    fn renders_text(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if NON_TEXT_TAGS.contains(&self.elements[n.0].tag.as_str()) {
                return false;
            }
            current = self.elements[n.0].parent;
        }
        true
    }

    fn innermost_with_text(&self, text: &str) -> Vec<NodeId> {
        let needle = text.to_lowercase();
        let candidates: Vec<NodeId> = self
            .attached()
            .filter(|&n| self.renders_text(n))
            .filter(|&n| self.elements[n.0].text.to_lowercase().contains(&needle))
            .collect();
        candidates
            .iter()
            .copied()
            .filter(|&c| !candidates.iter().any(|&m| m != c && self.is_ancestor(c, m)))
            .collect()
    }

    fn matches_complex(&self, node: NodeId, complex: &Complex) -> bool {
        self.matches_from(node, complex, complex.parts.len() - 1)
    }

    fn matches_from(&self, node: NodeId, complex: &Complex, k: usize) -> bool {
        if !complex.parts[k].matches(&self.elements[node.0]) {
            return false;
        }
        if k == 0 {
            return true;
        }
        let parent = self.elements[node.0].parent;
        match complex.combinators[k - 1] {
            Combinator::Child => parent.is_some_and(|p| self.matches_from(p, complex, k - 1)),
            Combinator::Descendant => {
                let mut current = parent;
                while let Some(p) = current {
                    if self.matches_from(p, complex, k - 1) {
                        return true;
                    }
                    current = self.elements[p.0].parent;
                }
                false
            }
        }
    }

    fn snapshot(&self, node: NodeId, selector: &SelectorDescriptor, index: usize) -> ElementHandle {
        let el = &self.elements[node.0];
        ElementHandle {
            selector: selector.to_string(),
            index,
            tag_name: el.tag.clone(),
            text_content: Some(el.text.clone()),
            classes: el.classes.clone(),
            attributes: el.attributes.clone(),
        }
    }
}

/// What the harness did to a [`MockPage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockInteraction {
    /// navigate(url)
    Navigate(String),
    /// Trusted click on a selector
    Click(String),
    /// Fill a selector with a value
    Fill(String, String),
    /// Drag between two selectors
    Drag(String, String),
    /// Key press
    Key(String),
    /// Synthetic event dispatch: target, event
    Dispatch(String, String),
    /// Method call: object, method
    Method(String, String),
}

impl fmt::Display for MockInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(url) => write!(f, "navigate {url}"),
            Self::Click(sel) => write!(f, "click {sel}"),
            Self::Fill(sel, value) => write!(f, "fill {sel} = {value}"),
            Self::Drag(from, to) => write!(f, "drag {from} -> {to}"),
            Self::Key(key) => write!(f, "key {key}"),
            Self::Dispatch(target, event) => write!(f, "dispatch {event} on {target}"),
            Self::Method(object, method) => write!(f, "call {object}.{method}()"),
        }
    }
}

#[derive(Default)]
struct Reactions {
    navigate: Vec<Reaction>,
    click: Vec<(String, Reaction)>,
    drop: Vec<(String, Reaction)>,
    key: Vec<(String, Reaction)>,
    event: Vec<(String, Reaction)>,
    method: Vec<(String, String, Reaction)>,
    evaluate: HashMap<String, ScriptFn>,
    scheduled: Vec<(Instant, Reaction)>,
}

/// Scriptable in-memory [`PageDriver`]
pub struct MockPage {
    document: Mutex<MockDocument>,
    reactions: Mutex<Reactions>,
    interactions: Mutex<Vec<MockInteraction>>,
    url: Mutex<String>,
    listeners: ListenerRegistry,
}

impl fmt::Debug for MockPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPage")
            .field("url", &self.url.lock().map(|u| u.clone()).unwrap_or_default())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockPage {
    /// Create an empty page at `about:blank`
    #[must_use]
    pub fn new() -> Self {
        Self {
            document: Mutex::new(MockDocument::default()),
            reactions: Mutex::new(Reactions::default()),
            interactions: Mutex::new(Vec::new()),
            url: Mutex::new("about:blank".to_string()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Mutate the document; diagnostics it reports are published afterwards
    pub fn with_document<R>(&self, f: impl FnOnce(&mut MockDocument) -> R) -> R {
        let (result, pending) = {
            let mut doc = relock(&self.document);
            let result = f(&mut *doc);
            (result, std::mem::take(&mut doc.pending))
        };
        for diagnostic in &pending {
            self.listeners.emit(diagnostic);
        }
        result
    }

    /// Run on every navigation (after the URL changes)
    pub fn on_navigate(&self, f: impl Fn(&mut MockDocument) + Send + Sync + 'static) -> &Self {
        relock(&self.reactions).navigate.push(Arc::new(f));
        self
    }

    /// Run when a trusted click lands on an element matching `css`
    pub fn on_click(
        &self,
        css: impl Into<String>,
        f: impl Fn(&mut MockDocument) + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions).click.push((css.into(), Arc::new(f)));
        self
    }

    /// Run when something is dragged onto an element matching `css`
    pub fn on_drop(
        &self,
        css: impl Into<String>,
        f: impl Fn(&mut MockDocument) + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions).drop.push((css.into(), Arc::new(f)));
        self
    }

    /// Run on a trusted key press of `key` (bare key or full chord text)
    pub fn on_key(
        &self,
        key: impl Into<String>,
        f: impl Fn(&mut MockDocument) + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions).key.push((key.into(), Arc::new(f)));
        self
    }

    /// Run when a synthetic event named `name` is dispatched (any target)
    pub fn on_event(
        &self,
        name: impl Into<String>,
        f: impl Fn(&mut MockDocument) + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions).event.push((name.into(), Arc::new(f)));
        self
    }

    /// Expose `object.method()` to the harness
    pub fn on_method(
        &self,
        object: impl Into<String>,
        method: impl Into<String>,
        f: impl Fn(&mut MockDocument) + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions)
            .method
            .push((object.into(), method.into(), Arc::new(f)));
        self
    }

    /// Answer `evaluate(script)` for an exact script text
    pub fn on_evaluate(
        &self,
        script: impl Into<String>,
        f: impl Fn(&MockDocument) -> Value + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions)
            .evaluate
            .insert(script.into(), Arc::new(f));
        self
    }

    /// Apply a mutation once `after` has elapsed on the tokio clock
    pub fn schedule(
        &self,
        after: Duration,
        f: impl Fn(&mut MockDocument) + Send + Sync + 'static,
    ) -> &Self {
        relock(&self.reactions)
            .scheduled
            .push((Instant::now() + after, Arc::new(f)));
        self
    }

    /// Everything the harness did, in order
    #[must_use]
    pub fn interactions(&self) -> Vec<MockInteraction> {
        relock(&self.interactions).clone()
    }

    fn record(&self, interaction: MockInteraction) {
        tracing::trace!(%interaction, "mock interaction");
        relock(&self.interactions).push(interaction);
    }

    fn apply(&self, reactions: &[Reaction]) {
        if reactions.is_empty() {
            return;
        }
        self.with_document(|doc| {
            for reaction in reactions {
                reaction(doc);
            }
        });
    }

    fn apply_due(&self) {
        let now = Instant::now();
        let due: Vec<Reaction> = {
            let mut reactions = relock(&self.reactions);
            let mut scheduled = std::mem::take(&mut reactions.scheduled);
            scheduled.sort_by_key(|(at, _)| *at);
            let (due, rest): (Vec<_>, Vec<_>) = scheduled.into_iter().partition(|(at, _)| *at <= now);
            reactions.scheduled = rest;
            due.into_iter().map(|(_, f)| f).collect()
        };
        self.apply(&due);
    }

    fn locate(&self, handle: &ElementHandle) -> ProbeResult<Option<NodeId>> {
        let selector = SelectorDescriptor::parse(&handle.selector)?;
        let doc = relock(&self.document);
        Ok(doc.select(&selector)?.get(handle.index).copied())
    }

    fn require(&self, handle: &ElementHandle) -> ProbeResult<NodeId> {
        self.locate(handle)?.ok_or_else(|| {
            ProbeError::driver(format!("element {} is detached", handle.selector))
        })
    }

    fn matching(&self, pick: impl Fn(&Reactions) -> Vec<Reaction>) -> Vec<Reaction> {
        pick(&relock(&self.reactions))
    }

    fn css_reactions(&self, node: NodeId, pick: impl Fn(&Reactions) -> &Vec<(String, Reaction)>) -> Vec<Reaction> {
        let candidates: Vec<(String, Reaction)> = pick(&relock(&self.reactions)).clone();
        let doc = relock(&self.document);
        candidates
            .into_iter()
            .filter(|(css, _)| doc.matches(node, css))
            .map(|(_, f)| f)
            .collect()
    }

    fn event_reactions(&self, name: &str) -> Vec<Reaction> {
        self.matching(|r| {
            r.event
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, f)| Arc::clone(f))
                .collect()
        })
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        self.apply_due();
        self.record(MockInteraction::Navigate(url.to_string()));
        *relock(&self.url) = url.to_string();
        let reactions = self.matching(|r| r.navigate.clone());
        self.apply(&reactions);
        Ok(())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(relock(&self.url).clone())
    }

    async fn count(&self, selector: &SelectorDescriptor) -> ProbeResult<usize> {
        self.apply_due();
        Ok(relock(&self.document).select(selector)?.len())
    }

    async fn element(
        &self,
        selector: &SelectorDescriptor,
        index: usize,
    ) -> ProbeResult<Option<ElementHandle>> {
        self.apply_due();
        let doc = relock(&self.document);
        let nodes = doc.select(selector)?;
        Ok(nodes
            .get(index)
            .map(|&node| doc.snapshot(node, selector, index)))
    }

    async fn read_global(&self, path: &str) -> ProbeResult<Option<Value>> {
        self.apply_due();
        global_path_segments(path)?;
        Ok(relock(&self.document).global(path).cloned())
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<Value> {
        self.apply_due();
        let handler = relock(&self.reactions).evaluate.get(script).cloned();
        match handler {
            Some(f) => {
                let doc = relock(&self.document);
                Ok(f(&*doc))
            }
            None => Err(ProbeError::script(format!(
                "MockPage has no handler for script: {script}"
            ))),
        }
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        self.apply_due();
        let node = self.require(element)?;
        let interactive = relock(&self.document)
            .get(node)
            .is_some_and(|el| el.interactive);
        if !interactive {
            return Err(ProbeError::driver(format!(
                "element {} does not receive pointer events",
                element.selector
            )));
        }
        self.record(MockInteraction::Click(element.selector.clone()));
        let reactions = self.css_reactions(node, |r| &r.click);
        self.apply(&reactions);
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        self.apply_due();
        let node = self.require(element)?;
        self.with_document(|doc| {
            if let Some(el) = doc.get_mut(node) {
                el.attributes.insert("value".to_string(), value.to_string());
            }
        });
        self.record(MockInteraction::Fill(element.selector.clone(), value.to_string()));
        let reactions = self.event_reactions("input");
        self.apply(&reactions);
        Ok(())
    }

    async fn drag(&self, from: &ElementHandle, to: &ElementHandle) -> ProbeResult<()> {
        self.apply_due();
        self.require(from)?;
        let target = self.require(to)?;
        self.record(MockInteraction::Drag(from.selector.clone(), to.selector.clone()));
        let reactions = self.css_reactions(target, |r| &r.drop);
        self.apply(&reactions);
        Ok(())
    }

    async fn press_key(&self, chord: &KeyChord) -> ProbeResult<()> {
        self.apply_due();
        let text = chord.to_string();
        self.record(MockInteraction::Key(text.clone()));
        let reactions = self.matching(|r| {
            r.key
                .iter()
                .filter(|(k, _)| *k == text || *k == chord.key)
                .map(|(_, f)| Arc::clone(f))
                .collect()
        });
        self.apply(&reactions);
        Ok(())
    }

    async fn dispatch_event(
        &self,
        target: &DispatchTarget,
        event: &SyntheticEvent,
    ) -> ProbeResult<bool> {
        self.apply_due();
        if let DispatchTarget::Element(handle) = target {
            if self.locate(handle)?.is_none() {
                return Ok(false);
            }
        }
        self.record(MockInteraction::Dispatch(target.to_string(), event.to_string()));
        let reactions = self.event_reactions(event.name());
        self.apply(&reactions);
        Ok(true)
    }

    async fn call_method(&self, object: &str, method: &str, _args: &[Value]) -> ProbeResult<bool> {
        self.apply_due();
        global_path_segments(object)?;
        let reactions = self.matching(|r| {
            r.method
                .iter()
                .filter(|(o, m, _)| o == object && m == method)
                .map(|(_, _, f)| Arc::clone(f))
                .collect()
        });
        if reactions.is_empty() {
            return Ok(false);
        }
        self.record(MockInteraction::Method(object.to_string(), method.to_string()));
        self.apply(&reactions);
        Ok(true)
    }

    fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }
}

// ---------------------------------------------------------------------------
// CSS subset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
    not: Vec<Compound>,
}

#[derive(Debug, Clone)]
struct AttrTest {
    name: String,
    op: AttributeOp,
    value: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone)]
struct Complex {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Compound {
    fn matches(&self, el: &MockElement) -> bool {
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(&el.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attributes.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.classes.contains(c)) {
            return false;
        }
        if !self
            .attrs
            .iter()
            .all(|a| a.op.matches(el.attr(&a.name).as_deref(), a.value.as_deref()))
        {
            return false;
        }
        !self.not.iter().any(|n| n.matches(el))
    }
}

fn parse_css(input: &str) -> Result<Vec<Complex>, String> {
    let mut list = Vec::new();
    for part in split_top_level(input) {
        let part = part.trim();
        if part.is_empty() {
            return Err("empty selector in list".to_string());
        }
        list.push(parse_complex(part)?);
    }
    Ok(list)
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut parts = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;
    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        match chars[i] {
            '>' => {
                if parts.is_empty() || pending.is_some() {
                    return Err("misplaced '>'".to_string());
                }
                pending = Some(Combinator::Child);
                i += 1;
                continue;
            }
            c @ ('+' | '~') => return Err(format!("combinator '{c}' is not supported")),
            _ => {}
        }
        if !parts.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        }
        let (compound, next) = parse_compound(&chars, i)?;
        parts.push(compound);
        i = next;
    }
    if pending.is_some() {
        return Err("selector ends with a combinator".to_string());
    }
    if parts.is_empty() {
        return Err("empty selector".to_string());
    }
    Ok(Complex { parts, combinators })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chars: &[char], start: usize) -> Result<(Compound, usize), String> {
    let mut compound = Compound::default();
    let mut i = start;
    if chars.get(i) == Some(&'*') {
        i += 1;
    } else if chars.get(i).is_some_and(|c| c.is_ascii_alphabetic()) {
        let (tag, next) = read_ident(chars, i);
        compound.tag = Some(tag.to_ascii_lowercase());
        i = next;
    }
    while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
        match chars[i] {
            '#' | '.' => {
                let (ident, next) = read_ident(chars, i + 1);
                if ident.is_empty() {
                    return Err(format!("expected identifier after '{}'", chars[i]));
                }
                if chars[i] == '#' {
                    compound.id = Some(ident);
                } else {
                    compound.classes.push(ident);
                }
                i = next;
            }
            '[' => {
                let (attr, next) = parse_attr(chars, i + 1)?;
                compound.attrs.push(attr);
                i = next;
            }
            ':' => {
                let rest: String = chars[i..].iter().collect();
                if !rest.starts_with(":not(") {
                    let (name, _) = read_ident(chars, i + 1);
                    return Err(format!("pseudo-class ':{name}' is not supported"));
                }
                let open = i + ":not(".len();
                let close = find_close(chars, open).ok_or("unclosed :not(")?;
                let inner: Vec<char> = chars[open..close].to_vec();
                let (negated, end) = parse_compound(&inner, 0)?;
                if end != inner.len() {
                    return Err(":not() takes a single compound selector".to_string());
                }
                compound.not.push(negated);
                i = close + 1;
            }
            c => return Err(format!("unexpected '{c}'")),
        }
    }
    if i == start {
        return Err("expected a selector".to_string());
    }
    Ok((compound, i))
}

fn find_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 1;
    let mut quote: Option<char> = None;
    for (offset, &c) in chars[open..].iter().enumerate() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_attr(chars: &[char], start: usize) -> Result<(AttrTest, usize), String> {
    let skip_ws = |mut i: usize| {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        i
    };
    let i = skip_ws(start);
    let (name, i) = read_ident(chars, i);
    if name.is_empty() {
        return Err("expected attribute name".to_string());
    }
    let mut i = skip_ws(i);
    let op = match chars.get(i) {
        Some(']') => {
            return Ok((
                AttrTest {
                    name,
                    op: AttributeOp::Exists,
                    value: None,
                },
                i + 1,
            ))
        }
        Some('=') => {
            i += 1;
            AttributeOp::Equals
        }
        Some(&c) if matches!(c, '^' | '$' | '*') && chars.get(i + 1) == Some(&'=') => {
            i += 2;
            match c {
                '^' => AttributeOp::Prefix,
                '$' => AttributeOp::Suffix,
                _ => AttributeOp::Contains,
            }
        }
        Some(c) => return Err(format!("attribute operator '{c}' is not supported")),
        None => return Err("unclosed '['".to_string()),
    };
    i = skip_ws(i);
    let value = match chars.get(i) {
        Some(&q) if q == '"' || q == '\'' => {
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    Some('\\') => {
                        if let Some(&next) = chars.get(i + 1) {
                            value.push(next);
                        }
                        i += 2;
                    }
                    Some(&c) if c == q => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        value.push(c);
                        i += 1;
                    }
                    None => return Err("unterminated attribute value".to_string()),
                }
            }
            value
        }
        _ => {
            let (ident, next) = read_ident(chars, i);
            i = next;
            ident
        }
    };
    i = skip_ws(i);
    if chars.get(i) != Some(&']') {
        return Err("expected ']'".to_string());
    }
    Ok((
        AttrTest {
            name,
            op,
            value: Some(value),
        },
        i + 1,
    ))
}

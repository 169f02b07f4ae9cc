//! Best-effort inference of an application's implicit state.
//!
//! A [`StateInferencer`] holds evidence probes in priority order. The first
//! probe reporting [`Evidence::Present`] decides the label; when every probe
//! is absent (or fails) the label is [`StateLabel::unknown`]. Tests are
//! expected to tolerate `unknown`:
//!
//! ```ignore
//! let state = inferencer.infer(&page).await.label;
//! assert!(state.is_one_of(&["idle", "unknown"]));
//! ```

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::driver::{ElementHandle, PageDriver};
use crate::result::ProbeResult;
use crate::selector::SelectorDescriptor;
use crate::wait::CountRule;

/// Approximate state label ("idle", "running", "done", "unknown", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateLabel(String);

impl StateLabel {
    /// Label used when no probe produced evidence
    pub const UNKNOWN: &'static str = "unknown";

    /// Create a label
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The `unknown` label
    #[must_use]
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Whether this is `unknown`
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    /// Label text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the label is in a tolerated set
    #[must_use]
    pub fn is_one_of(&self, labels: &[&str]) -> bool {
        labels.iter().any(|l| *l == self.0)
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StateLabel {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What one probe observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// The probe recognised a state
    Present(StateLabel),
    /// Nothing to report
    Absent,
}

/// Kind of evidence a probe reads, in default priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCapability {
    /// An explicit state variable exposed by the page
    ExplicitState,
    /// A CSS class on some element
    DomClass,
    /// Element text
    DomText,
    /// An attribute value
    DomAttribute,
    /// Number of matching elements
    Count,
    /// Arbitrary script
    Script,
}

/// A read-only observation of page state
#[async_trait]
pub trait EvidenceProbe: Send + Sync {
    /// Name used in inference trails
    fn name(&self) -> &str;

    /// What the probe reads
    fn capability(&self) -> ProbeCapability;

    /// Observe the page; errors are treated as absence by the inferencer
    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence>;
}

/// Elements matching a selector, in order
async fn all_elements(
    driver: &dyn PageDriver,
    selector: &SelectorDescriptor,
) -> ProbeResult<Vec<ElementHandle>> {
    let count = driver.count(selector).await?;
    let mut elements = Vec::with_capacity(count);
    for index in 0..count {
        if let Some(el) = driver.element(selector, index).await? {
            elements.push(el);
        }
    }
    Ok(elements)
}

fn scalar_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads the first defined global among several dotted paths
#[derive(Debug, Clone)]
pub struct GlobalStateProbe {
    name: String,
    paths: Vec<String>,
    labels: BTreeMap<String, String>,
}

impl GlobalStateProbe {
    /// Probe the given paths in order
    #[must_use]
    pub fn new<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        Self {
            name: format!("global({})", paths.join("|")),
            paths,
            labels: BTreeMap::new(),
        }
    }

    /// Map a raw value to a label
    #[must_use]
    pub fn map(mut self, raw: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(raw.into(), label.into());
        self
    }

    /// Replace the label map
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

#[async_trait]
impl EvidenceProbe for GlobalStateProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> ProbeCapability {
        ProbeCapability::ExplicitState
    }

    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence> {
        for path in &self.paths {
            let Some(value) = driver.read_global(path).await? else {
                continue;
            };
            if let Some(raw) = scalar_label(&value) {
                let label = self.labels.get(&raw).cloned().unwrap_or(raw);
                return Ok(Evidence::Present(StateLabel::new(label)));
            }
        }
        Ok(Evidence::Absent)
    }
}

/// Present when any element matching a selector carries a class
#[derive(Debug, Clone)]
pub struct ClassProbe {
    name: String,
    selector: SelectorDescriptor,
    class: String,
    label: StateLabel,
}

impl ClassProbe {
    /// Create a class probe
    #[must_use]
    pub fn new(selector: SelectorDescriptor, class: impl Into<String>, label: impl Into<StateLabel>) -> Self {
        let class = class.into();
        Self {
            name: format!("class({selector}.{class})"),
            selector,
            class,
            label: label.into(),
        }
    }
}

#[async_trait]
impl EvidenceProbe for ClassProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> ProbeCapability {
        ProbeCapability::DomClass
    }

    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence> {
        let elements = all_elements(driver, &self.selector).await?;
        if elements.iter().any(|el| el.has_class(&self.class)) {
            Ok(Evidence::Present(self.label.clone()))
        } else {
            Ok(Evidence::Absent)
        }
    }
}

/// Present when a selector's match count satisfies a rule
#[derive(Debug, Clone)]
pub struct CountProbe {
    name: String,
    selector: SelectorDescriptor,
    rule: CountRule,
    label: StateLabel,
}

impl CountProbe {
    /// Create a count probe
    #[must_use]
    pub fn new(selector: SelectorDescriptor, rule: CountRule, label: impl Into<StateLabel>) -> Self {
        Self {
            name: format!("count({selector} {rule})"),
            selector,
            rule,
            label: label.into(),
        }
    }
}

#[async_trait]
impl EvidenceProbe for CountProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> ProbeCapability {
        ProbeCapability::Count
    }

    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence> {
        let count = driver.count(&self.selector).await?;
        if self.rule.accepts(count) {
            Ok(Evidence::Present(self.label.clone()))
        } else {
            Ok(Evidence::Absent)
        }
    }
}

/// Regex over the first matching element's text.
///
/// The label is the fixed label when set, else the first capture group,
/// else the whole match.
#[derive(Debug, Clone)]
pub struct TextProbe {
    name: String,
    selector: SelectorDescriptor,
    pattern: Regex,
    label: Option<StateLabel>,
}

impl TextProbe {
    /// Create a text probe labelled from the match
    #[must_use]
    pub fn new(selector: SelectorDescriptor, pattern: Regex) -> Self {
        Self {
            name: format!("text({selector} /{}/)", pattern.as_str()),
            selector,
            pattern,
            label: None,
        }
    }

    /// Use a fixed label when the pattern matches
    #[must_use]
    pub fn with_label(mut self, label: impl Into<StateLabel>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl EvidenceProbe for TextProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> ProbeCapability {
        ProbeCapability::DomText
    }

    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence> {
        let Some(element) = driver.element(&self.selector, 0).await? else {
            return Ok(Evidence::Absent);
        };
        let Some(captures) = self.pattern.captures(element.text()) else {
            return Ok(Evidence::Absent);
        };
        let label = match &self.label {
            Some(label) => label.clone(),
            None => {
                let text = captures.get(1).or_else(|| captures.get(0)).map_or("", |m| m.as_str());
                StateLabel::new(text.trim())
            }
        };
        Ok(Evidence::Present(label))
    }
}

/// Label from an attribute of the first matching element
#[derive(Debug, Clone)]
pub struct AttributeProbe {
    name: String,
    selector: SelectorDescriptor,
    attribute: String,
    equals: Option<String>,
    label: Option<StateLabel>,
}

impl AttributeProbe {
    /// Use the attribute's value as the label
    #[must_use]
    pub fn new(selector: SelectorDescriptor, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            name: format!("attribute({selector}@{attribute})"),
            selector,
            attribute,
            equals: None,
            label: None,
        }
    }

    /// Only present when the attribute equals `value`
    #[must_use]
    pub fn equals(mut self, value: impl Into<String>) -> Self {
        self.equals = Some(value.into());
        self
    }

    /// Use a fixed label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<StateLabel>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl EvidenceProbe for AttributeProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> ProbeCapability {
        ProbeCapability::DomAttribute
    }

    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence> {
        let Some(element) = driver.element(&self.selector, 0).await? else {
            return Ok(Evidence::Absent);
        };
        let Some(value) = element.attribute(&self.attribute) else {
            return Ok(Evidence::Absent);
        };
        if self.equals.as_deref().is_some_and(|expected| expected != value) || value.is_empty() {
            return Ok(Evidence::Absent);
        }
        let label = self.label.clone().unwrap_or_else(|| StateLabel::new(value));
        Ok(Evidence::Present(label))
    }
}

/// Evaluates a script returning a label or null
#[derive(Debug, Clone)]
pub struct ScriptProbe {
    name: String,
    script: String,
}

impl ScriptProbe {
    /// Create a script probe
    #[must_use]
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }
}

#[async_trait]
impl EvidenceProbe for ScriptProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> ProbeCapability {
        ProbeCapability::Script
    }

    async fn observe(&self, driver: &dyn PageDriver) -> ProbeResult<Evidence> {
        let value = driver.evaluate(&self.script).await?;
        Ok(scalar_label(&value).map_or(Evidence::Absent, |l| Evidence::Present(StateLabel::new(l))))
    }
}

/// One probe's result within an inference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Produced a label
    Present(StateLabel),
    /// Reported nothing
    Absent,
    /// Failed; treated as absent
    Errored(String),
}

/// Trail entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Probe name
    pub probe: String,
    /// What it reported
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

/// Result of [`StateInferencer::infer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inference {
    /// Inferred label (`unknown` when nothing was present)
    pub label: StateLabel,
    /// Name of the probe that produced the label
    pub source: Option<String>,
    /// Probes evaluated, in order
    pub trail: Vec<ProbeReport>,
}

/// Prioritized list of evidence probes
#[derive(Clone, Default)]
pub struct StateInferencer {
    probes: Vec<Arc<dyn EvidenceProbe>>,
}

impl fmt::Debug for StateInferencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.probes.iter().map(|p| p.name()))
            .finish()
    }
}

impl StateInferencer {
    /// Create an empty inferencer (always infers `unknown`)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a probe at the lowest priority
    #[must_use]
    pub fn with_probe(mut self, probe: impl EvidenceProbe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }

    /// Append a shared probe at the lowest priority
    pub fn push(&mut self, probe: Arc<dyn EvidenceProbe>) {
        self.probes.push(probe);
    }

    /// Reorder by capability rank; probes of equal rank keep their order
    #[must_use]
    pub fn by_capability(mut self) -> Self {
        self.probes.sort_by_key(|p| p.capability());
        self
    }

    /// Probe names in priority order
    #[must_use]
    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Number of probes
    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether there are no probes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Evaluate probes in order; the first present one wins
    pub async fn infer(&self, driver: &dyn PageDriver) -> Inference {
        let mut trail = Vec::new();
        for probe in &self.probes {
            let outcome = match probe.observe(driver).await {
                Ok(Evidence::Present(label)) => ProbeOutcome::Present(label),
                Ok(Evidence::Absent) => ProbeOutcome::Absent,
                Err(e) => {
                    tracing::debug!(probe = probe.name(), error = %e, "evidence probe failed");
                    ProbeOutcome::Errored(e.to_string())
                }
            };
            let present = match &outcome {
                ProbeOutcome::Present(label) => Some(label.clone()),
                _ => None,
            };
            trail.push(ProbeReport {
                probe: probe.name().to_string(),
                outcome,
            });
            if let Some(label) = present {
                return Inference {
                    label,
                    source: Some(probe.name().to_string()),
                    trail,
                };
            }
        }
        Inference {
            label: StateLabel::unknown(),
            source: None,
            trail,
        }
    }

    /// Just the label
    pub async fn label(&self, driver: &dyn PageDriver) -> StateLabel {
        self.infer(driver).await.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};
    use crate::result::ProbeError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        evidence: Evidence,
    }

    #[async_trait]
    impl EvidenceProbe for CountingProbe {
        fn name(&self) -> &str {
            "counting"
        }

        fn capability(&self) -> ProbeCapability {
            ProbeCapability::Script
        }

        async fn observe(&self, _driver: &dyn PageDriver) -> ProbeResult<Evidence> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.evidence.clone())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl EvidenceProbe for FailingProbe {
        fn name(&self) -> &str {
            "failing"
        }

        fn capability(&self) -> ProbeCapability {
            ProbeCapability::Script
        }

        async fn observe(&self, _driver: &dyn PageDriver) -> ProbeResult<Evidence> {
            Err(ProbeError::script("ReferenceError: app is not defined"))
        }
    }

    mod label_tests {
        use super::*;

        #[test]
        fn test_unknown() {
            let label = StateLabel::unknown();
            assert!(label.is_unknown());
            assert!(label.is_one_of(&["idle", "unknown"]));
            assert!(!StateLabel::from("idle").is_unknown());
        }

        #[test]
        fn test_serializes_as_string() {
            assert_eq!(serde_json::to_string(&StateLabel::new("done")).unwrap(), "\"done\"");
        }
    }

    mod inferencer_tests {
        use super::*;

        #[tokio::test]
        async fn test_class_probe_wins_when_global_undefined() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.add(MockElement::new("li").with_class("item").with_class("selected"));
            });
            let inferencer = StateInferencer::new()
                .with_probe(GlobalStateProbe::new(["fsm.state", "app.state"]))
                .with_probe(ClassProbe::new(SelectorDescriptor::css("li"), "selected", "selected"));

            let inference = inferencer.infer(&page).await;
            assert_eq!(inference.label.as_str(), "selected");
            assert_eq!(inference.trail.len(), 2);
            assert_eq!(inference.trail[0].outcome, ProbeOutcome::Absent);
            assert!(inference.source.unwrap().starts_with("class("));
        }

        #[tokio::test]
        async fn test_all_absent_is_unknown() {
            let page = MockPage::new();
            let inferencer = StateInferencer::new()
                .with_probe(GlobalStateProbe::new(["app.state"]))
                .with_probe(CountProbe::new(SelectorDescriptor::css(".node"), CountRule::AtLeast(1), "running"));
            let inference = inferencer.infer(&page).await;
            assert!(inference.label.is_unknown());
            assert!(inference.source.is_none());
        }

        #[tokio::test]
        async fn test_empty_inferencer_is_unknown() {
            let page = MockPage::new();
            assert!(StateInferencer::new().label(&page).await.is_unknown());
        }

        #[tokio::test]
        async fn test_first_present_short_circuits() {
            let page = MockPage::new();
            let first = Arc::new(AtomicUsize::new(0));
            let second = Arc::new(AtomicUsize::new(0));
            let inferencer = StateInferencer::new()
                .with_probe(CountingProbe {
                    calls: first.clone(),
                    evidence: Evidence::Present("idle".into()),
                })
                .with_probe(CountingProbe {
                    calls: second.clone(),
                    evidence: Evidence::Present("running".into()),
                });
            assert_eq!(inferencer.label(&page).await.as_str(), "idle");
            assert_eq!(first.load(Ordering::SeqCst), 1);
            assert_eq!(second.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_probe_errors_are_absent() {
            let page = MockPage::new();
            page.with_document(|doc| doc.set_global("app.state", json!("paused")));
            let inferencer = StateInferencer::new()
                .with_probe(FailingProbe)
                .with_probe(GlobalStateProbe::new(["app.state"]));
            let inference = inferencer.infer(&page).await;
            assert_eq!(inference.label.as_str(), "paused");
            assert!(matches!(inference.trail[0].outcome, ProbeOutcome::Errored(_)));
        }

        #[tokio::test]
        async fn test_inference_is_idempotent() {
            let page = MockPage::new();
            page.with_document(|doc| doc.set_global("fsm.state", json!("running")));
            let inferencer = StateInferencer::new().with_probe(GlobalStateProbe::new(["fsm.state"]));
            let a = inferencer.infer(&page).await;
            let b = inferencer.infer(&page).await;
            assert_eq!(a, b);
        }

        #[test]
        fn test_by_capability_is_stable() {
            let inferencer = StateInferencer::new()
                .with_probe(ScriptProbe::new("script", "window.x"))
                .with_probe(CountProbe::new(SelectorDescriptor::css("a"), CountRule::Exactly(0), "idle"))
                .with_probe(ClassProbe::new(SelectorDescriptor::css("b"), "on", "on"))
                .with_probe(GlobalStateProbe::new(["app.state"]))
                .with_probe(ClassProbe::new(SelectorDescriptor::css("c"), "on", "on"))
                .by_capability();
            let names = inferencer.probe_names();
            assert_eq!(names[0], "global(app.state)");
            assert!(names[1].starts_with("class(b"));
            assert!(names[2].starts_with("class(c"));
            assert!(names[3].starts_with("count("));
            assert_eq!(names[4], "script");
        }
    }

    mod probe_tests {
        use super::*;

        #[tokio::test]
        async fn test_global_probe_first_defined_path_and_mapping() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.set_global("app.state", json!(2));
                doc.set_global("legacy.mode", json!("busy"));
            });
            let probe = GlobalStateProbe::new(["fsm.state", "app.state", "legacy.mode"]).map("2", "done");
            assert_eq!(
                probe.observe(&page).await.unwrap(),
                Evidence::Present("done".into())
            );
        }

        #[tokio::test]
        async fn test_global_probe_skips_objects_and_null() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.set_global("fsm", json!({ "state": null }));
                doc.set_global("app.state", json!(true));
            });
            let probe = GlobalStateProbe::new(["fsm", "fsm.state", "app.state"]);
            assert_eq!(
                probe.observe(&page).await.unwrap(),
                Evidence::Present("true".into())
            );
        }

        #[tokio::test]
        async fn test_text_probe_capture_group() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.add(MockElement::new("div").with_id("status").with_text("Status: Running"));
            });
            let probe = TextProbe::new(
                SelectorDescriptor::css("#status"),
                Regex::new(r"(?i)status:\s*(\w+)").unwrap(),
            );
            assert_eq!(
                probe.observe(&page).await.unwrap(),
                Evidence::Present("Running".into())
            );
        }

        #[tokio::test]
        async fn test_text_probe_fixed_label_and_absent() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.add(MockElement::new("p").with_id("msg").with_text("Search complete"));
            });
            let probe = TextProbe::new(SelectorDescriptor::css("#msg"), Regex::new("complete").unwrap())
                .with_label("done");
            assert_eq!(probe.observe(&page).await.unwrap(), Evidence::Present("done".into()));

            let missing = TextProbe::new(SelectorDescriptor::css("#nope"), Regex::new(".").unwrap());
            assert_eq!(missing.observe(&page).await.unwrap(), Evidence::Absent);
        }

        #[tokio::test]
        async fn test_attribute_probe() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.add(MockElement::new("main").with_attr("data-state", "sorting"));
            });
            let sel = SelectorDescriptor::css("main");
            let raw = AttributeProbe::new(sel.clone(), "data-state");
            assert_eq!(raw.observe(&page).await.unwrap(), Evidence::Present("sorting".into()));

            let gated = AttributeProbe::new(sel, "data-state").equals("done").with_label("done");
            assert_eq!(gated.observe(&page).await.unwrap(), Evidence::Absent);
        }

        #[tokio::test]
        async fn test_count_probe() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.add(MockElement::new("div").with_class("node"));
            });
            let idle = CountProbe::new(SelectorDescriptor::css(".node.visited"), CountRule::Exactly(0), "idle");
            assert_eq!(idle.observe(&page).await.unwrap(), Evidence::Present("idle".into()));
        }

        #[tokio::test]
        async fn test_script_probe() {
            let page = MockPage::new();
            page.on_evaluate("window.sorter && window.sorter.phase", |_| json!("merge"));
            page.on_evaluate("null", |_| Value::Null);
            let probe = ScriptProbe::new("phase", "window.sorter && window.sorter.phase");
            assert_eq!(probe.observe(&page).await.unwrap(), Evidence::Present("merge".into()));
            let empty = ScriptProbe::new("nothing", "null");
            assert_eq!(empty.observe(&page).await.unwrap(), Evidence::Absent);
        }
    }
}

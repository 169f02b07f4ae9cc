//! Scenario YAML schema types.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::action::ActionSpec;
use crate::driver::global_path_segments;
use crate::inference::{
    AttributeProbe, ClassProbe, CountProbe, EvidenceProbe, GlobalStateProbe, ScriptProbe,
    StateInferencer, TextProbe,
};
use crate::selector::SelectorDescriptor;
use crate::wait::{CountRule, DomCondition, WaitOptions};

/// Supported scenario schema version
pub const SCENARIO_VERSION: &str = "1.0";

fn default_version() -> String {
    SCENARIO_VERSION.to_string()
}

/// Root scenario document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,
    /// Scenario name
    #[serde(default)]
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Page under test
    #[serde(default)]
    pub url: String,
    /// Evidence probes, highest priority first
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
    /// Steps, in order
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    /// What the page may report
    #[serde(default)]
    pub diagnostics: DiagnosticsExpectation,
}

/// Evidence probe definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSpec {
    /// First defined global among `paths`
    Global {
        /// Dotted paths, e.g. `fsm.state`
        paths: Vec<String>,
        /// Raw value to label remapping
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        labels: BTreeMap<String, String>,
    },
    /// Some match carries a class
    Class {
        /// Selector
        selector: SelectorDescriptor,
        /// Class name
        class: String,
        /// Label when present
        label: String,
    },
    /// Match count satisfies a rule
    Count {
        /// Selector
        selector: SelectorDescriptor,
        /// Rule
        rule: CountRule,
        /// Label when satisfied
        label: String,
    },
    /// Regex over the first match's text
    Text {
        /// Selector
        selector: SelectorDescriptor,
        /// Pattern; the first capture group is the label unless `label` is set
        pattern: String,
        /// Fixed label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Attribute of the first match
    Attribute {
        /// Selector
        selector: SelectorDescriptor,
        /// Attribute name
        attribute: String,
        /// Required value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        equals: Option<String>,
        /// Fixed label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Script returning a label or null
    Script {
        /// Probe name
        name: String,
        /// Expression
        script: String,
    },
}

impl ProbeSpec {
    /// Build the runtime probe
    pub fn build(&self) -> Result<Arc<dyn EvidenceProbe>, ScenarioError> {
        let probe: Arc<dyn EvidenceProbe> = match self {
            Self::Global { paths, labels } => {
                Arc::new(GlobalStateProbe::new(paths.iter().cloned()).with_labels(labels.clone()))
            }
            Self::Class {
                selector,
                class,
                label,
            } => Arc::new(ClassProbe::new(selector.clone(), class.clone(), label.as_str())),
            Self::Count {
                selector,
                rule,
                label,
            } => Arc::new(CountProbe::new(selector.clone(), *rule, label.as_str())),
            Self::Text {
                selector,
                pattern,
                label,
            } => {
                let regex = Regex::new(pattern).map_err(|e| ScenarioError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                let probe = TextProbe::new(selector.clone(), regex);
                Arc::new(match label {
                    Some(label) => probe.with_label(label.as_str()),
                    None => probe,
                })
            }
            Self::Attribute {
                selector,
                attribute,
                equals,
                label,
            } => {
                let mut probe = AttributeProbe::new(selector.clone(), attribute.clone());
                if let Some(value) = equals {
                    probe = probe.equals(value.clone());
                }
                if let Some(label) = label {
                    probe = probe.with_label(label.as_str());
                }
                Arc::new(probe)
            }
            Self::Script { name, script } => Arc::new(ScriptProbe::new(name.clone(), script.clone())),
        };
        Ok(probe)
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Self::Global { paths, .. } => {
                if paths.is_empty() {
                    return Err("global probe needs at least one path".into());
                }
                for path in paths {
                    global_path_segments(path).map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            Self::Script { script, .. } if script.trim().is_empty() => Err("script probe has an empty script".into()),
            Self::Script { .. } => Ok(()),
            Self::Class { selector, .. }
            | Self::Count { selector, .. }
            | Self::Text { selector, .. }
            | Self::Attribute { selector, .. } => check_selector(selector),
        }
    }
}

/// Condition definition for wait and check steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSpec {
    /// Some candidate resolves
    Exists(Vec<SelectorDescriptor>),
    /// No candidate resolves
    Absent(Vec<SelectorDescriptor>),
    /// Match count satisfies a rule
    Count {
        /// Selector
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
        /// Text
        text: String,
    },
    /// First match's attribute equals a value
    AttributeEquals {
        /// Selector
        selector: SelectorDescriptor,
        /// Attribute
        attribute: String,
        /// Value
        value: String,
    },
    /// Some match carries a class
    HasClass {
        /// Selector
        selector: SelectorDescriptor,
        /// Class
        class: String,
    },
    /// A global equals a value
    GlobalEquals {
        /// Dotted path
        path: String,
        /// Expected value
        value: Value,
    },
    /// Inferred state (from the scenario's probes) is one of the labels
    State(Vec<String>),
}

impl ConditionSpec {
    /// Build the runtime condition
    #[must_use]
    pub fn to_condition(&self, inferencer: &StateInferencer) -> DomCondition {
        match self.clone() {
            Self::Exists(candidates) => DomCondition::Exists(candidates),
            Self::Absent(candidates) => DomCondition::Absent(candidates),
            Self::Count { selector, rule } => DomCondition::Count { selector, rule },
            Self::TextContains { selector, text } => DomCondition::TextContains { selector, text },
            Self::TextEquals { selector, text } => DomCondition::TextEquals { selector, text },
            Self::AttributeEquals {
                selector,
                attribute,
                value,
            } => DomCondition::AttributeEquals {
                selector,
                attribute,
                value,
            },
            Self::HasClass { selector, class } => DomCondition::HasClass { selector, class },
            Self::GlobalEquals { path, value } => DomCondition::GlobalEquals { path, value },
            Self::State(labels) => DomCondition::StateIn {
                inferencer: inferencer.clone(),
                labels,
            },
        }
    }

    fn check(&self, has_probes: bool) -> Result<(), String> {
        match self {
            Self::Exists(c) | Self::Absent(c) if c.is_empty() => Err("condition needs at least one selector".into()),
            Self::Exists(c) | Self::Absent(c) => check_candidates(c),
            Self::GlobalEquals { path, .. } => global_path_segments(path).map(|_| ()).map_err(|e| e.to_string()),
            Self::State(labels) if labels.is_empty() => Err("state condition needs at least one label".into()),
            Self::State(_) if !has_probes => Err("state condition requires at least one probe".into()),
            Self::State(_) => Ok(()),
            Self::Count { selector, .. }
            | Self::TextContains { selector, .. }
            | Self::TextEquals { selector, .. }
            | Self::AttributeEquals { selector, .. }
            | Self::HasClass { selector, .. } => check_selector(selector),
        }
    }
}

/// Poll for a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitStep {
    /// Condition
    pub condition: ConditionSpec,
    /// Timeout override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Poll interval override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_ms: Option<u64>,
    /// Tolerate a timeout instead of failing the scenario
    #[serde(default)]
    pub optional: bool,
}

impl WaitStep {
    /// Effective options given the harness defaults
    #[must_use]
    pub fn options(&self, defaults: WaitOptions) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            poll_interval_ms: self.poll_ms.unwrap_or(defaults.poll_interval_ms),
        }
    }
}

/// Repeat an action until a condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryStep {
    /// Action repeated each round
    pub action: ActionSpec,
    /// Condition checked after each round
    pub until: ConditionSpec,
    /// Round bound override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSpec {
    /// Navigate again
    Goto(String),
    /// Poll for a condition
    Wait(WaitStep),
    /// Condition must hold now
    Check(ConditionSpec),
    /// Inferred state must be one of the labels
    ExpectState(Vec<String>),
    /// Fixed delay in milliseconds
    Settle(u64),
    /// Bounded action-then-check loop
    Retry(RetryStep),
    /// Any action (`click`, `fill`, `press`, `drag`, `dispatch`)
    #[serde(untagged)]
    Action(ActionSpec),
}

impl StepSpec {
    /// Short description for reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Goto(url) => format!("goto {url}"),
            Self::Wait(step) => format!("wait {}", describe_condition(&step.condition)),
            Self::Check(condition) => format!("check {}", describe_condition(condition)),
            Self::ExpectState(labels) => format!("expect state in [{}]", labels.join(", ")),
            Self::Settle(ms) => format!("settle {ms}ms"),
            Self::Retry(step) => format!("retry {} until {}", step.action, describe_condition(&step.until)),
            Self::Action(action) => action.to_string(),
        }
    }

    /// Whether this step mutates the page
    #[must_use]
    pub const fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }
}

fn describe_condition(condition: &ConditionSpec) -> String {
    condition.to_condition(&StateInferencer::new()).to_string()
}

/// What diagnostics the page may report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsExpectation {
    /// No console errors or uncaught exceptions
    #[default]
    Clean,
    /// At least one diagnostic must match (case-insensitive)
    Matching(String),
    /// Anything goes
    Any,
}

impl DiagnosticsExpectation {
    /// Compiled pattern for `Matching`
    pub fn pattern(&self) -> Result<Option<Regex>, ScenarioError> {
        match self {
            Self::Matching(pattern) => diagnostic_pattern(pattern).map(Some),
            Self::Clean | Self::Any => Ok(None),
        }
    }
}

/// Case-insensitive pattern over diagnostic messages
pub fn diagnostic_pattern(pattern: &str) -> Result<Regex, ScenarioError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ScenarioError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

impl Scenario {
    /// Parse without validating
    pub fn parse(yaml: &str) -> Result<Self, ScenarioError> {
        crate::yaml::from_str(yaml).map_err(|e| ScenarioError::Parse(e.to_string()))
    }

    /// Serialize back to the scenario file form
    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        crate::yaml::to_string(self).map_err(|e| ScenarioError::Serialize(e.to_string()))
    }

    /// Parse and validate, failing on the first problem
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        let scenario = Self::parse(yaml)?;
        match scenario.validate().into_iter().next() {
            Some(error) => Err(error),
            None => Ok(scenario),
        }
    }

    /// Read, parse and validate a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ScenarioError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&text)
    }

    /// Every problem found, in document order
    #[must_use]
    pub fn validate(&self) -> Vec<ScenarioError> {
        let mut errors = Vec::new();

        if self.version != SCENARIO_VERSION {
            errors.push(ScenarioError::InvalidVersion(self.version.clone()));
        }
        if self.name.trim().is_empty() {
            errors.push(ScenarioError::MissingField("name"));
        }
        if self.url.trim().is_empty() {
            errors.push(ScenarioError::MissingField("url"));
        }

        for (i, probe) in self.probes.iter().enumerate() {
            if let Err(reason) = probe.check() {
                errors.push(ScenarioError::InvalidProbe { index: i + 1, reason });
            }
            if let Err(e) = probe.build() {
                errors.push(e);
            }
        }

        let has_probes = !self.probes.is_empty();
        for (i, step) in self.steps.iter().enumerate() {
            if let Err(reason) = check_step(step, has_probes) {
                errors.push(ScenarioError::InvalidStep { index: i + 1, reason });
            }
        }

        if let Err(e) = self.diagnostics.pattern() {
            errors.push(e);
        }
        errors
    }

    /// Runtime inferencer from the probe list
    pub fn inferencer(&self) -> Result<StateInferencer, ScenarioError> {
        let mut inferencer = StateInferencer::new();
        for probe in &self.probes {
            inferencer.push(probe.build()?);
        }
        Ok(inferencer)
    }
}

fn check_step(step: &StepSpec, has_probes: bool) -> Result<(), String> {
    match step {
        StepSpec::Goto(url) if url.trim().is_empty() => Err("goto needs a url".into()),
        StepSpec::Wait(wait) => {
            if wait.timeout_ms == Some(0) {
                return Err("timeout_ms must be greater than 0".into());
            }
            if wait.poll_ms == Some(0) {
                return Err("poll_ms must be greater than 0".into());
            }
            wait.condition.check(has_probes)
        }
        StepSpec::Check(condition) => condition.check(has_probes),
        StepSpec::ExpectState(labels) if labels.is_empty() => Err("expect_state needs at least one label".into()),
        StepSpec::ExpectState(_) if !has_probes => Err("expect_state requires at least one probe".into()),
        StepSpec::Retry(retry) => {
            if retry.max_iterations == Some(0) {
                return Err("max_iterations must be greater than 0".into());
            }
            check_action(&retry.action)?;
            retry.until.check(has_probes)
        }
        StepSpec::Action(action) => check_action(action),
        _ => Ok(()),
    }
}

fn check_action(action: &ActionSpec) -> Result<(), String> {
    match action {
        ActionSpec::Click { target, .. } | ActionSpec::Fill { target, .. } => check_candidates(target),
        ActionSpec::Drag { from, to, .. } => {
            check_candidates(from)?;
            check_candidates(to)
        }
        ActionSpec::Keypress { .. } | ActionSpec::SyntheticEvent { .. } => Ok(()),
    }
}

fn check_selector(selector: &SelectorDescriptor) -> Result<(), String> {
    selector.validate().map_err(|e| e.to_string())
}

/// Malformed candidates are skipped at resolution time; a list needs one usable entry
fn check_candidates(candidates: &[SelectorDescriptor]) -> Result<(), String> {
    if candidates.iter().any(|c| c.validate().is_ok()) {
        return Ok(());
    }
    let written: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    Err(format!("no usable selector among [{}]", written.join(", ")))
}

/// Errors found while loading or validating a scenario
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to parse YAML: {0}")]
    Parse(String),

    #[error("Failed to write YAML: {0}")]
    Serialize(String),

    #[error("Invalid version '{0}', expected '1.0'")]
    InvalidVersion(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Probe {index}: {reason}")]
    InvalidProbe { index: usize, reason: String },

    #[error("Step {index}: {reason}")]
    InvalidStep { index: usize, reason: String },

    #[error("Invalid pattern /{pattern}/: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BFS_SCENARIO: &str = r##"
version: "1.0"
name: bfs visualizer
url: http://localhost:8080/bfs.html
probes:
  - global: { paths: [fsm.state, app.state] }
  - class: { selector: ".node", class: visited, label: running }
  - count: { selector: ".node.visited", rule: { exactly: 0 }, label: idle }
steps:
  - click: { target: ["#start", "button:has-text(\"Start\")"] }
  - wait: { condition: { count: { selector: ".node.visited", rule: { exactly: 7 } } }, timeout_ms: 12000, poll_ms: 200 }
  - expect_state: [done, unknown]
diagnostics: clean
"##;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_full_scenario() {
            let scenario = Scenario::from_yaml(BFS_SCENARIO).unwrap();
            assert_eq!(scenario.name, "bfs visualizer");
            assert_eq!(scenario.probes.len(), 3);
            assert_eq!(scenario.steps.len(), 3);
            assert!(scenario.steps[0].is_action());
            assert_eq!(scenario.diagnostics, DiagnosticsExpectation::Clean);

            let StepSpec::Wait(wait) = &scenario.steps[1] else {
                panic!("expected wait step");
            };
            let options = wait.options(WaitOptions::default());
            assert_eq!(options.timeout_ms, 12_000);
            assert_eq!(options.poll_interval_ms, 200);
            assert!(!wait.optional);
        }

        #[test]
        fn test_written_scenario_reads_back() {
            let scenario = Scenario::from_yaml(BFS_SCENARIO).unwrap();
            let text = scenario.to_yaml().unwrap();
            assert!(text.contains("click:"));
            assert!(text.contains("exactly: 7"));
            assert!(!text.contains('!'));
            assert_eq!(Scenario::from_yaml(&text).unwrap(), scenario);
        }

        #[test]
        fn test_probe_and_condition_maps() {
            let scenario = Scenario::from_yaml(BFS_SCENARIO).unwrap();
            assert!(matches!(
                &scenario.probes[0],
                ProbeSpec::Global { paths, .. } if paths == &["fsm.state".to_string(), "app.state".to_string()]
            ));
            assert!(matches!(
                scenario.probes[2],
                ProbeSpec::Count { rule: CountRule::Exactly(0), .. }
            ));
            let StepSpec::Action(ActionSpec::Click { target, .. }) = &scenario.steps[0] else {
                panic!("expected click step");
            };
            assert_eq!(target[1], SelectorDescriptor::css_with_text("button", "Start"));
        }

        #[test]
        fn test_inferencer_keeps_probe_order() {
            let scenario = Scenario::from_yaml(BFS_SCENARIO).unwrap();
            let inferencer = scenario.inferencer().unwrap();
            assert_eq!(inferencer.len(), 3);
            assert!(inferencer.probe_names()[0].starts_with("global("));
            assert!(inferencer.probe_names()[2].starts_with("count("));
        }

        #[test]
        fn test_other_step_kinds() {
            let yaml = r##"
name: steps
url: http://fixture
probes:
  - text: { selector: "#status", pattern: "State: (\\w+)" }
steps:
  - goto: http://fixture/other
  - press: { key: ArrowRight }
  - settle: 300
  - check: { exists: ["#board"] }
  - retry:
      action: { dispatch: { event: step, strategies: [{ method_call: { object: app, method: step } }] } }
      until: { state: [done] }
      max_iterations: 20
  - wait: { condition: { global_equals: { path: app.ready, value: true } }, optional: true }
diagnostics: { matching: "syntax|unexpected" }
"##;
            let scenario = Scenario::from_yaml(yaml).unwrap();
            assert_eq!(scenario.version, "1.0");
            assert_eq!(scenario.steps.len(), 6);
            assert_eq!(scenario.steps[0], StepSpec::Goto("http://fixture/other".into()));
            assert_eq!(scenario.steps[1].describe(), "press ArrowRight");
            assert_eq!(scenario.steps[2], StepSpec::Settle(300));
            assert!(matches!(scenario.steps[4], StepSpec::Retry(_)));
            assert_eq!(
                scenario.diagnostics,
                DiagnosticsExpectation::Matching("syntax|unexpected".into())
            );
            let pattern = scenario.diagnostics.pattern().unwrap().unwrap();
            assert!(pattern.is_match("Uncaught SyntaxError: Unexpected token"));
        }

        #[test]
        fn test_diagnostics_any() {
            let scenario = Scenario::parse("name: x\nurl: y\ndiagnostics: any\n").unwrap();
            assert_eq!(scenario.diagnostics, DiagnosticsExpectation::Any);
        }

        #[test]
        fn test_malformed_yaml() {
            let err = Scenario::from_yaml("name: [unclosed").unwrap_err();
            assert!(matches!(err, ScenarioError::Parse(_)));
        }

        #[test]
        fn test_malformed_candidate_is_kept_for_resolution() {
            let yaml = "name: x\nurl: y\nsteps:\n  - click: { target: [\"div[\", \"#ok\"] }\n";
            let scenario = Scenario::from_yaml(yaml).unwrap();
            let StepSpec::Action(ActionSpec::Click { target, .. }) = &scenario.steps[0] else {
                panic!("expected click step");
            };
            assert!(matches!(&target[0], SelectorDescriptor::Unparsed { raw, .. } if raw == "div["));
            assert_eq!(target[1], SelectorDescriptor::css("#ok"));
        }

        #[test]
        fn test_target_without_usable_selector_is_invalid() {
            let yaml = "name: x\nurl: y\nsteps:\n  - click: { target: [\"div[\"] }\n";
            let errors = Scenario::parse(yaml).unwrap().validate();
            assert_eq!(errors.len(), 1);
            assert!(matches!(&errors[0], ScenarioError::InvalidStep { index: 1, reason } if reason.contains("div[")));
        }

        #[test]
        fn test_malformed_probe_selector_is_invalid() {
            let yaml = "name: x\nurl: y\nprobes:\n  - class: { selector: \"li[\", class: on, label: on }\n";
            let errors = Scenario::parse(yaml).unwrap().validate();
            assert!(matches!(errors[0], ScenarioError::InvalidProbe { index: 1, .. }));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_collects_every_problem() {
            let yaml = r##"
version: "2.0"
probes:
  - global: { paths: [] }
  - text: { selector: "#s", pattern: "(" }
steps:
  - wait: { condition: { exists: ["#x"] }, timeout_ms: 0 }
  - expect_state: []
diagnostics: { matching: "[" }
"##;
            let errors = Scenario::parse(yaml).unwrap().validate();
            assert!(errors.contains(&ScenarioError::InvalidVersion("2.0".into())));
            assert!(errors.contains(&ScenarioError::MissingField("name")));
            assert!(errors.contains(&ScenarioError::MissingField("url")));
            assert!(errors.iter().any(|e| matches!(e, ScenarioError::InvalidProbe { index: 1, .. })));
            assert!(errors.iter().any(|e| matches!(e, ScenarioError::InvalidPattern { pattern, .. } if pattern == "(")));
            assert!(errors.iter().any(|e| matches!(e, ScenarioError::InvalidStep { index: 1, .. })));
            assert!(errors.iter().any(|e| matches!(e, ScenarioError::InvalidStep { index: 2, .. })));
            assert!(errors.iter().any(|e| matches!(e, ScenarioError::InvalidPattern { pattern, .. } if pattern == "[")));
        }

        #[test]
        fn test_state_steps_need_probes() {
            let yaml = "name: x\nurl: y\nsteps:\n  - expect_state: [idle]\n  - check: { state: [idle] }\n";
            let errors = Scenario::parse(yaml).unwrap().validate();
            assert_eq!(errors.len(), 2);
        }

        #[test]
        fn test_bad_global_path() {
            let yaml = "name: x\nurl: y\nprobes:\n  - global: { paths: [\"app.state()\"] }\n";
            let errors = Scenario::parse(yaml).unwrap().validate();
            assert!(matches!(errors[0], ScenarioError::InvalidProbe { index: 1, .. }));
        }

        #[test]
        fn test_load_missing_file() {
            let err = Scenario::load("/nonexistent/scenario.yaml").unwrap_err();
            assert!(matches!(err, ScenarioError::Io { .. }));
        }
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn test_state_condition_uses_scenario_inferencer() {
            let inferencer = StateInferencer::new().with_probe(GlobalStateProbe::new(["fsm.state"]));
            let condition = ConditionSpec::State(vec!["done".into()]).to_condition(&inferencer);
            assert!(matches!(condition, DomCondition::StateIn { ref labels, .. } if labels == &["done".to_string()]));
        }

        #[test]
        fn test_describe() {
            let step = StepSpec::Wait(WaitStep {
                condition: ConditionSpec::Count {
                    selector: SelectorDescriptor::css(".node.visited"),
                    rule: CountRule::Exactly(7),
                },
                timeout_ms: None,
                poll_ms: None,
                optional: false,
            });
            assert!(step.describe().starts_with("wait "));
            assert!(step.describe().contains("exactly 7"));
        }
    }
}

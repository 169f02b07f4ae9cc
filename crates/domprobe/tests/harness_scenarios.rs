//! End-to-end harness behavior against the in-memory page.
//!
//! Each test drives the public API the way a browser test would: start a
//! session, navigate, resolve, act, wait, infer and read diagnostics.

use domprobe::prelude::*;
use domprobe::scenario::StepStatus;
use domprobe::{resolve_strs, MockInteraction, Waiter};
use regex::RegexBuilder;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn sel(s: &str) -> SelectorDescriptor {
    SelectorDescriptor::parse(s).unwrap()
}

// ============================================================================
// Selector resolution
// ============================================================================

#[tokio::test]
async fn fallback_selector_finds_submit_button() {
    let page = MockPage::new();
    page.with_document(|doc| {
        doc.add(MockElement::new("button").with_text("Submit"));
    });

    let resolution = resolve_strs(&page, &["#missingBtn", "button:has-text(\"Submit\")"]).await;

    assert!(resolution.exists());
    let element = resolution.element().unwrap();
    assert_eq!(element.tag_name, "button");
    assert_eq!(element.text(), "Submit");
    assert_eq!(resolution.attempts().len(), 2);
}

#[tokio::test]
async fn no_candidate_matching_is_not_an_error() {
    let page = MockPage::new();
    let resolution = resolve_strs(&page, &["#a", "#b", ""]).await;
    assert!(!resolution.exists());
    assert_eq!(resolution.count(), 0);
    assert_eq!(resolution.attempts().len(), 3);
}

// ============================================================================
// State inference
// ============================================================================

#[tokio::test]
async fn class_probe_answers_when_global_is_undefined() {
    let page = MockPage::new();
    page.with_document(|doc| {
        doc.add(MockElement::new("li").with_id("item").with_class("selected"));
    });
    let inferencer = StateInferencer::new()
        .with_probe(GlobalStateProbe::new(["fsm.state"]))
        .with_probe(ClassProbe::new(sel("#item"), "selected", "selected"));

    let inference = inferencer.infer(&page).await;

    assert_eq!(inference.label.as_str(), "selected");
    assert!(inference.source.unwrap().starts_with("class("));
    assert_eq!(inference.trail.len(), 2);
}

#[tokio::test]
async fn global_probe_outranks_dom_evidence() {
    let page = MockPage::new();
    page.with_document(|doc| {
        doc.set_global("fsm.state", json!("running"));
        doc.add(MockElement::new("li").with_id("item").with_class("selected"));
    });
    let inferencer = StateInferencer::new()
        .with_probe(GlobalStateProbe::new(["fsm.state"]))
        .with_probe(ClassProbe::new(sel("#item"), "selected", "selected"));

    assert_eq!(inferencer.label(&page).await.as_str(), "running");
}

// ============================================================================
// Condition waiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn seven_nodes_marked_one_per_second() {
    let page = MockPage::new();
    page.with_document(|doc| {
        for i in 1..=7 {
            doc.add(MockElement::new("div").with_id(format!("n{i}")).with_class("node"));
        }
    });
    for i in 1..=7u64 {
        page.schedule(Duration::from_secs(i), move |doc| {
            doc.add_class(&format!("#n{i}"), "visited");
        });
    }

    let condition = DomCondition::Count {
        selector: sel(".node.visited"),
        rule: CountRule::Exactly(7),
    };
    let options = WaitOptions::new().with_timeout(12_000).with_poll_interval(200);
    let outcome = Waiter::new(&page).wait_for(&condition, &options).await;

    assert!(outcome.is_fulfilled(), "{outcome}");
    assert!(outcome.elapsed() >= Duration::from_secs(6));
    assert!(outcome.elapsed() <= Duration::from_millis(7_400));
}

#[tokio::test(start_paused = true)]
async fn wait_reports_timeout_instead_of_failing() {
    let page = MockPage::new();
    let condition = DomCondition::Exists(vec![sel("#never")]);
    let options = WaitOptions::new().with_timeout(1_000).with_poll_interval(100);

    let start = Instant::now();
    let outcome = Waiter::new(&page).wait_for(&condition, &options).await;

    assert!(!outcome.is_fulfilled());
    assert!(start.elapsed() >= Duration::from_millis(1_000));
    assert!(outcome.into_result("#never").is_err());
}

// ============================================================================
// Diagnostics
// ============================================================================

#[tokio::test]
async fn parse_error_during_load_is_collected() {
    let page = Arc::new(MockPage::new());
    page.on_navigate(|doc| doc.throw_exception("Uncaught SyntaxError: Unexpected token '}'"));

    let session = ProbeSession::start(page.clone(), HarnessConfig::default());
    session.goto("http://fixture/broken.html").await.unwrap();

    let pattern = RegexBuilder::new("syntax|unexpected")
        .case_insensitive(true)
        .build()
        .unwrap();
    let errors = session.diagnostics().errors();
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|d| pattern.is_match(&d.message)));

    let report = session.finish().await;
    assert!(report.diagnostics.assert_clean().is_err());
}

// ============================================================================
// Event delivery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn missing_button_falls_back_to_method_call() {
    let page = Arc::new(MockPage::new());
    page.on_method("app", "send", |doc| doc.set_global("app.state", json!("running")));

    let mut session = ProbeSession::start(page.clone(), HarnessConfig::default());
    session.goto("http://fixture/headless.html").await.unwrap();

    let action = ActionSpec::click_or(
        vec![sel("#start"), sel("button:has-text(\"Start\")")],
        Fallback::new("START").then(DeliveryStrategy::method("app", "send")),
    );
    let inferencer = StateInferencer::new().with_probe(GlobalStateProbe::new(["app.state"]));
    let record = session.transition(&action, None, &inferencer).await.unwrap();

    assert!(record.delivery.is_synthetic());
    assert_eq!(record.observed.as_str(), "running");
    assert!(page
        .interactions()
        .iter()
        .any(|i| matches!(i, MockInteraction::Method(object, method) if object == "app" && method == "send")));
}

#[tokio::test]
async fn undeliverable_action_is_the_only_hard_failure() {
    let page = Arc::new(MockPage::new());
    let session = ProbeSession::start(page, HarnessConfig::default());

    let err = session
        .drive(&ActionSpec::click(vec![sel("#nowhere")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::ActionUndeliverable { .. }));
}

// ============================================================================
// Scenario files
// ============================================================================

const TRAFFIC_LIGHT: &str = r##"
name: traffic light
url: http://fixture/light.html
probes:
  - global: { paths: [light.state] }
  - class: { selector: "#lamp", class: green, label: go }
steps:
  - click: { target: ["#next", "button:has-text(\"Next\")"] }
  - wait: { condition: { has_class: { selector: "#lamp", class: green } }, timeout_ms: 2000 }
  - expect_state: [go]
diagnostics: clean
"##;

fn traffic_light_page() -> Arc<MockPage> {
    let page = Arc::new(MockPage::new());
    page.on_navigate(|doc| {
        doc.add(MockElement::new("button").with_text("Next"));
        doc.add(MockElement::new("div").with_id("lamp").with_class("red"));
    });
    page.on_click("button", |doc| {
        doc.remove_class("#lamp", "red");
        doc.add_class("#lamp", "green");
    });
    page
}

#[tokio::test(start_paused = true)]
async fn scenario_file_runs_to_completion() {
    let scenario = Scenario::from_yaml(TRAFFIC_LIGHT).unwrap();
    let report = ScenarioRunner::default()
        .run(&scenario, traffic_light_page())
        .await;

    assert!(report.passed, "{:?}", report.failure());
    assert_eq!(report.final_state.as_str(), "go");
    assert_eq!(report.passed_steps(), 3);
    assert_eq!(report.transitions.path(), vec!["go"]);
}

#[tokio::test(start_paused = true)]
async fn scenario_stops_at_first_failed_step() {
    let yaml = TRAFFIC_LIGHT.replace("expect_state: [go]", "expect_state: [stop]");
    let scenario = Scenario::from_yaml(&yaml).unwrap();
    let report = ScenarioRunner::default()
        .run(&scenario, traffic_light_page())
        .await;

    assert!(!report.passed);
    let last = report.steps.last().unwrap();
    assert_eq!(last.status, StepStatus::Failed);
    assert!(last.error.as_deref().unwrap().contains("stop"));
}

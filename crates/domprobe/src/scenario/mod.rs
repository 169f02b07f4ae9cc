//! Declarative probe scenarios
//!
//! A scenario names a page, the evidence probes used to infer its state, a
//! list of steps, and what the collected diagnostics must look like at the
//! end. [`ScenarioRunner`] executes it against any [`crate::PageDriver`].
//!
//! # Example
//!
//! ```yaml
//! version: "1.0"
//! name: bfs visualizer
//! url: http://localhost:8080/bfs.html
//! probes:
//!   - global: { paths: [fsm.state, app.state] }
//!   - count: { selector: ".node.visited", rule: { exactly: 0 }, label: idle }
//! steps:
//!   - click: { target: ["#start", "button:has-text(\"Start\")"] }
//!   - wait:
//!       condition: { count: { selector: ".node.visited", rule: { exactly: 7 } } }
//!       timeout_ms: 12000
//!   - expect_state: [done, unknown]
//! diagnostics: clean
//! ```

pub mod runner;
pub mod schema;

pub use runner::{check_diagnostics, ScenarioReport, ScenarioRunner, StepReport, StepStatus};
pub use schema::{
    diagnostic_pattern, ConditionSpec, DiagnosticsExpectation, ProbeSpec, RetryStep, Scenario,
    ScenarioError, StepSpec, WaitStep, SCENARIO_VERSION,
};

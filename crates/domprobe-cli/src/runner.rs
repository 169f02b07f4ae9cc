//! Scenario discovery and suite execution

use domprobe::scenario::{Scenario, ScenarioError, ScenarioReport, ScenarioRunner};
use domprobe::{HarnessConfig, PageDriver};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Expand file arguments; arguments containing glob metacharacters are patterns
pub fn expand_inputs(inputs: &[String]) -> CliResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let before = paths.len();
            for entry in glob::glob(input)? {
                match entry {
                    Ok(path) if path.is_file() => paths.push(path),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(pattern = %input, error = %e, "unreadable match"),
                }
            }
            if paths.len() == before {
                return Err(CliError::invalid_argument(format!("no files match '{input}'")));
            }
        } else {
            paths.push(PathBuf::from(input));
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Read, parse and validate one scenario file, keeping every problem
pub fn check_scenario(path: &Path) -> Result<Scenario, Vec<ScenarioError>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        vec![ScenarioError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }]
    })?;
    let scenario = Scenario::parse(&text).map_err(|e| vec![e])?;
    let errors = scenario.validate();
    if errors.is_empty() {
        Ok(scenario)
    } else {
        Err(errors)
    }
}

/// Load every file, failing on the first invalid one
pub fn load_scenarios(paths: &[PathBuf]) -> CliResult<Vec<Scenario>> {
    paths
        .iter()
        .map(|path| {
            check_scenario(path).map_err(|errors| CliError::Scenario {
                path: path.display().to_string(),
                message: errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            })
        })
        .collect()
}

/// Keep scenarios whose name contains `filter`
#[must_use]
pub fn filter_scenarios(scenarios: Vec<Scenario>, filter: Option<&str>) -> Vec<Scenario> {
    match filter {
        Some(text) => scenarios
            .into_iter()
            .filter(|s| s.name.contains(text))
            .collect(),
        None => scenarios,
    }
}

/// Reports for one invocation
#[derive(Debug, Clone, Default)]
pub struct SuiteSummary {
    /// Per-scenario reports, in run order
    pub reports: Vec<ScenarioReport>,
    /// Wall time
    pub duration: Duration,
}

impl SuiteSummary {
    /// Scenarios that passed
    #[must_use]
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed).count()
    }

    /// Scenarios that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    /// Whether every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(|r| r.passed)
    }

    /// Wall time in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Runs scenarios one after another, each on a fresh page
#[derive(Debug)]
pub struct SuiteRunner {
    config: CliConfig,
    runner: ScenarioRunner,
    reporter: ProgressReporter,
}

impl SuiteRunner {
    /// Create a suite runner
    #[must_use]
    pub fn new(config: CliConfig, harness: HarnessConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self {
            config,
            runner: ScenarioRunner::new(harness),
            reporter,
        }
    }

    /// Run `scenarios`; `open_page` supplies a fresh page per scenario
    pub async fn run<F, Fut>(&mut self, scenarios: &[Scenario], mut open_page: F) -> SuiteSummary
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CliResult<Arc<dyn PageDriver>>>,
    {
        let start = Instant::now();
        let mut summary = SuiteSummary::default();

        if scenarios.is_empty() {
            self.reporter.warning("No scenarios to run");
            return summary;
        }
        self.reporter.start_progress(scenarios.len() as u64);

        for scenario in scenarios {
            self.reporter.scenario_started(&scenario.name);
            let report = match open_page().await {
                Ok(page) => {
                    let report = self.runner.run(scenario, Arc::clone(&page)).await;
                    if let Err(e) = page.close().await {
                        tracing::debug!(scenario = %scenario.name, error = %e, "page close failed");
                    }
                    report
                }
                Err(e) => ScenarioReport::not_started(scenario, e.to_string()),
            };
            self.reporter.scenario_finished(&report);
            let failed = !report.passed;
            summary.reports.push(report);
            if failed && self.config.fail_fast {
                self.reporter.warning("Stopping after first failure (--fail-fast)");
                break;
            }
        }

        self.reporter.finish();
        summary.duration = start.elapsed();
        self.reporter
            .summary(summary.passed(), summary.failed(), summary.duration);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domprobe::{MockElement, MockPage};

    const PASSING: &str = r##"
name: panel opens
url: http://fixture/panel.html
probes:
  - class: { selector: "#panel", class: open, label: open }
steps:
  - click: { target: ["#toggle"] }
  - expect_state: [open]
"##;

    const FAILING: &str = r##"
name: panel stays shut
url: http://fixture/panel.html
probes:
  - class: { selector: "#panel", class: open, label: open }
steps:
  - expect_state: [open]
"##;

    fn panel_page() -> Arc<dyn PageDriver> {
        let page = MockPage::new();
        page.on_navigate(|doc| {
            doc.add(MockElement::new("button").with_id("toggle"));
            doc.add(MockElement::new("div").with_id("panel"));
        });
        page.on_click("#toggle", |doc| {
            doc.add_class("#panel", "open");
        });
        Arc::new(page)
    }

    fn quiet() -> CliConfig {
        CliConfig::new().with_verbosity(crate::config::Verbosity::Quiet)
    }

    mod discovery_tests {
        use super::*;

        #[test]
        fn test_glob_expansion_sorted() {
            let dir = tempfile::tempdir().unwrap();
            for name in ["b.yaml", "a.yaml", "notes.txt"] {
                std::fs::write(dir.path().join(name), PASSING).unwrap();
            }
            let pattern = format!("{}/*.yaml", dir.path().display());
            let paths = expand_inputs(&[pattern]).unwrap();
            assert_eq!(paths.len(), 2);
            assert!(paths[0].ends_with("a.yaml"));
        }

        #[test]
        fn test_unmatched_glob_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let pattern = format!("{}/*.yaml", dir.path().display());
            assert!(expand_inputs(&[pattern]).is_err());
        }

        #[test]
        fn test_check_collects_every_problem() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bad.yaml");
            std::fs::write(&path, "version: \"2.0\"\nname: \"\"\nurl: x\n").unwrap();
            let errors = check_scenario(&path).unwrap_err();
            assert!(errors.len() >= 2);
        }

        #[test]
        fn test_load_reports_path() {
            let err = load_scenarios(&[PathBuf::from("/nonexistent/s.yaml")]).unwrap_err();
            assert!(err.to_string().contains("/nonexistent/s.yaml"));
        }

        #[test]
        fn test_filter_by_name() {
            let scenarios = vec![
                Scenario::from_yaml(PASSING).unwrap(),
                Scenario::from_yaml(FAILING).unwrap(),
            ];
            let kept = filter_scenarios(scenarios, Some("opens"));
            assert_eq!(kept.len(), 1);
            assert_eq!(kept[0].name, "panel opens");
        }
    }

    mod suite_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_suite_runs_each_scenario_on_fresh_page() {
            let scenarios = vec![
                Scenario::from_yaml(PASSING).unwrap(),
                Scenario::from_yaml(FAILING).unwrap(),
            ];
            let mut opened = 0;
            let mut suite = SuiteRunner::new(quiet(), HarnessConfig::default());
            let summary = suite
                .run(&scenarios, || {
                    opened += 1;
                    async { Ok(panel_page()) }
                })
                .await;
            assert_eq!(opened, 2);
            assert_eq!(summary.passed(), 1);
            assert_eq!(summary.failed(), 1);
            assert!(!summary.all_passed());
        }

        #[tokio::test(start_paused = true)]
        async fn test_fail_fast_stops() {
            let scenarios = vec![
                Scenario::from_yaml(FAILING).unwrap(),
                Scenario::from_yaml(PASSING).unwrap(),
            ];
            let mut suite = SuiteRunner::new(quiet().with_fail_fast(true), HarnessConfig::default());
            let summary = suite.run(&scenarios, || async { Ok(panel_page()) }).await;
            assert_eq!(summary.reports.len(), 1);
        }

        #[tokio::test]
        async fn test_page_failure_marks_scenario_not_started() {
            let scenarios = vec![Scenario::from_yaml(PASSING).unwrap()];
            let mut suite = SuiteRunner::new(quiet(), HarnessConfig::default());
            let summary = suite
                .run(&scenarios, || async {
                    Err(CliError::BrowserUnavailable)
                })
                .await;
            assert!(!summary.all_passed());
            assert!(summary.reports[0].error.as_deref().unwrap().contains("browser"));
        }
    }
}

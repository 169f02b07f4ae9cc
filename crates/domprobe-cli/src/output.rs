//! Progress reporting and report rendering

use clap::ValueEnum;
use console::{style, Style, Term};
use domprobe::scenario::{ScenarioReport, StepStatus};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::CliResult;
use crate::runner::SuiteSummary;

/// Report format for scenario results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
    /// JUnit XML for CI systems
    Junit,
}

impl OutputFormat {
    /// Render a finished suite
    pub fn render(self, summary: &SuiteSummary, use_color: bool) -> CliResult<String> {
        match self {
            Self::Text => Ok(render_text(summary, use_color)),
            Self::Json => render_json(summary),
            Self::Junit => Ok(render_junit(summary)),
        }
    }
}

/// Live progress on stderr while scenarios run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.progress_bar = Some(pb);
    }

    /// Announce the scenario about to run
    pub fn scenario_started(&self, name: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(name.to_string());
        }
    }

    /// Record a finished scenario
    pub fn scenario_finished(&self, report: &ScenarioReport) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
        let line = format!("{} ({}ms)", report.name, report.duration_ms);
        if report.passed {
            self.success(&line);
        } else {
            self.failure(&format!(
                "{line}: {}",
                report.failure().unwrap_or("unknown error")
            ));
        }
    }

    /// Clear the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.line(style("✓").green().bold(), "PASS", message);
        }
    }

    /// Print a failure message; shown even in quiet mode
    pub fn failure(&self, message: &str) {
        self.line(style("✗").red().bold(), "FAIL", message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.line(style("⚠").yellow().bold(), "WARN", message);
        }
    }

    fn line(&self, glyph: console::StyledObject<&str>, plain: &str, message: &str) {
        let prefix = if self.use_color {
            glyph.to_string()
        } else {
            plain.to_string()
        };
        let text = format!("{prefix} {message}");
        match self.progress_bar {
            Some(ref pb) => pb.println(text),
            None => {
                let _ = self.term.write_line(&text);
            }
        }
    }

    /// Print the closing tally
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }
        let total = passed + failed;
        let secs = duration.as_secs_f64();
        let status = if failed > 0 { "FAILED" } else { "PASSED" };
        let status = if self.use_color {
            let s = if failed > 0 {
                Style::new().red().bold()
            } else {
                Style::new().green().bold()
            };
            s.apply_to(status).to_string()
        } else {
            status.to_string()
        };
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&format!(
            "{status} {total} scenarios in {secs:.2}s ({passed} passed, {failed} failed)"
        ));
    }
}

/// Plain or colored text report
#[must_use]
pub fn render_text(summary: &SuiteSummary, use_color: bool) -> String {
    let paint = |ok: bool, text: &str| -> String {
        match (use_color, ok) {
            (false, _) => text.to_string(),
            (true, true) => style(text).green().to_string(),
            (true, false) => style(text).red().to_string(),
        }
    };

    let mut out = String::new();
    for report in &summary.reports {
        let badge = if report.passed { "PASS" } else { "FAIL" };
        let _ = writeln!(
            out,
            "{} {} ({}ms) final state: {}",
            paint(report.passed, badge),
            report.name,
            report.duration_ms,
            report.final_state
        );
        for step in &report.steps {
            let mark = match step.status {
                StepStatus::Passed => paint(true, "ok  "),
                StepStatus::Failed => paint(false, "FAIL"),
                StepStatus::Skipped => "skip".to_string(),
            };
            let _ = write!(out, "  {mark} {:>2}. {}", step.index, step.description);
            if let Some(detail) = step.detail.as_deref().filter(|d| !d.is_empty()) {
                let _ = write!(out, " [{detail}]");
            }
            out.push('\n');
            if let Some(error) = &step.error {
                let _ = writeln!(out, "         {error}");
            }
        }
        if let Some(error) = &report.error {
            let _ = writeln!(out, "  error: {error}");
        }
        for diagnostic in &report.diagnostics.diagnostics {
            let _ = writeln!(out, "  {}: {}", diagnostic.kind, diagnostic.message);
        }
    }
    let _ = writeln!(
        out,
        "{} passed, {} failed in {}ms",
        summary.passed(),
        summary.failed(),
        summary.duration_ms()
    );
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    passed: usize,
    failed: usize,
    duration_ms: u64,
    scenarios: &'a [ScenarioReport],
}

/// Pretty JSON report
pub fn render_json(summary: &SuiteSummary) -> CliResult<String> {
    let doc = JsonReport {
        passed: summary.passed(),
        failed: summary.failed(),
        duration_ms: summary.duration_ms(),
        scenarios: &summary.reports,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn secs(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// JUnit XML: one testsuite per scenario, one testcase per step
#[must_use]
pub fn render_junit(summary: &SuiteSummary) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let tests: usize = summary.reports.iter().map(|r| r.steps.len() + 1).sum();
    let failures: usize = summary.reports.iter().map(junit_failures).sum();
    let _ = writeln!(
        out,
        "<testsuites name=\"domprobe\" tests=\"{tests}\" failures=\"{failures}\" time=\"{}\">",
        secs(summary.duration_ms())
    );

    for report in &summary.reports {
        let name = xml_escape(&report.name);
        let skipped = report
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Skipped)
            .count();
        let _ = writeln!(
            out,
            "  <testsuite name=\"{name}\" tests=\"{}\" failures=\"{}\" skipped=\"{skipped}\" time=\"{}\" timestamp=\"{}\">",
            report.steps.len() + 1,
            junit_failures(report),
            secs(report.duration_ms),
            report.started_at.to_rfc3339()
        );
        for step in &report.steps {
            let _ = write!(
                out,
                "    <testcase classname=\"{name}\" name=\"{}. {}\" time=\"{}\"",
                step.index,
                xml_escape(&step.description),
                secs(step.duration_ms)
            );
            match step.status {
                StepStatus::Passed => out.push_str("/>\n"),
                StepStatus::Skipped => out.push_str(">\n      <skipped/>\n    </testcase>\n"),
                StepStatus::Failed => {
                    let message = xml_escape(step.error.as_deref().unwrap_or("failed"));
                    let _ = write!(
                        out,
                        ">\n      <failure message=\"{message}\"/>\n    </testcase>\n"
                    );
                }
            }
        }

        let _ = write!(out, "    <testcase classname=\"{name}\" name=\"diagnostics\"");
        match scenario_level_error(report) {
            Some(error) => {
                let _ = write!(
                    out,
                    ">\n      <failure message=\"{}\"/>\n    </testcase>\n",
                    xml_escape(error)
                );
            }
            None => out.push_str("/>\n"),
        }

        if !report.diagnostics.diagnostics.is_empty() {
            out.push_str("    <system-err>");
            for diagnostic in &report.diagnostics.diagnostics {
                let _ = writeln!(
                    out,
                    "{}: {}",
                    diagnostic.kind,
                    xml_escape(&diagnostic.message)
                );
            }
            out.push_str("</system-err>\n");
        }
        out.push_str("  </testsuite>\n");
    }
    out.push_str("</testsuites>\n");
    out
}

/// Error not attributable to a step (setup or diagnostics expectation)
fn scenario_level_error(report: &ScenarioReport) -> Option<&str> {
    let step_failed = report.steps.iter().any(|s| s.status == StepStatus::Failed);
    report.error.as_deref().filter(|_| !step_failed || report.steps.is_empty())
}

fn junit_failures(report: &ScenarioReport) -> usize {
    report
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
        .count()
        + usize::from(scenario_level_error(report).is_some())
}

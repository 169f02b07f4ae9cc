//! domprobe: run DOM probe scenarios against live pages
//!
//! ## Usage
//!
//! ```bash
//! domprobe validate scenarios/*.yaml             # Check files, no browser
//! domprobe run scenarios/*.yaml                  # Run in headless Chromium
//! domprobe run bfs.yaml --format junit -o out.xml
//! domprobe config --config harness.yaml          # Effective defaults
//! ```

use clap::Parser;
use domprobe::HarnessConfig;
use domprobe_cli::{
    check_scenario, expand_inputs, filter_scenarios, load_harness_config, load_scenarios, Cli,
    CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs, ProgressReporter, RunArgs,
    SuiteRunner, SuiteSummary, ValidateArgs, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}

fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.verbosity == Verbosity::Debug)
        .with_ansi(config.color.should_color())
        .try_init();
}

fn run(command: Commands, config: &CliConfig) -> CliResult<()> {
    match command {
        Commands::Run(args) => run_scenarios(config, &args),
        Commands::Validate(args) => run_validate(config, &args),
        Commands::Config(args) => run_config(&args),
    }
}

fn run_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let paths = expand_inputs(&args.files)?;
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());

    let mut invalid = 0;
    for path in &paths {
        match check_scenario(path) {
            Ok(scenario) => reporter.success(&format!(
                "{} ({}, {} steps)",
                path.display(),
                scenario.name,
                scenario.steps.len()
            )),
            Err(errors) => {
                invalid += 1;
                reporter.failure(&path.display().to_string());
                for error in &errors {
                    eprintln!("    {error}");
                }
            }
        }
    }

    if invalid == 0 {
        Ok(())
    } else {
        Err(CliError::test_execution(format!(
            "{invalid} of {} scenario files are invalid",
            paths.len()
        )))
    }
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let harness = load_harness_config(args.config.as_deref(), None, None)?;
    print!("{}", harness.to_yaml()?);
    Ok(())
}

fn run_scenarios(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let harness = load_harness_config(args.config.as_deref(), args.timeout_ms, args.poll_ms)?;
    let paths = expand_inputs(&args.files)?;
    let scenarios = filter_scenarios(load_scenarios(&paths)?, args.filter.as_deref());
    let config = config.clone().with_fail_fast(args.fail_fast);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(execute(config.clone(), harness, &scenarios, args))?;

    let use_color = args.output.is_none() && config.color.should_color();
    let rendered = args.format.render(&summary, use_color)?;
    match &args.output {
        Some(path) => std::fs::write(path, rendered)?,
        None => print!("{rendered}"),
    }

    if summary.all_passed() {
        Ok(())
    } else {
        Err(CliError::test_execution(format!(
            "{} of {} scenarios failed",
            summary.failed(),
            summary.reports.len()
        )))
    }
}

#[cfg(feature = "browser")]
async fn execute(
    config: CliConfig,
    harness: HarnessConfig,
    scenarios: &[domprobe::Scenario],
    args: &RunArgs,
) -> CliResult<SuiteSummary> {
    use domprobe::{ChromiumBrowser, ChromiumConfig, PageDriver};
    use std::sync::Arc;

    if scenarios.is_empty() {
        return Ok(SuiteRunner::new(config, harness).run(scenarios, no_page).await);
    }

    let mut chromium = ChromiumConfig::default();
    if args.headed {
        chromium = chromium.headed();
    }
    if args.no_sandbox {
        chromium = chromium.no_sandbox();
    }
    if let Some(path) = &args.chromium_path {
        chromium = chromium.with_chromium_path(path.clone());
    }
    let browser = ChromiumBrowser::launch(chromium).await?;

    let mut suite = SuiteRunner::new(config, harness);
    let summary = {
        let browser = &browser;
        suite
            .run(scenarios, move || async move {
                let page = browser.new_page().await?;
                Ok::<Arc<dyn PageDriver>, CliError>(Arc::new(page))
            })
            .await
    };
    browser.close().await?;
    Ok(summary)
}

#[cfg(not(feature = "browser"))]
async fn execute(
    config: CliConfig,
    harness: HarnessConfig,
    scenarios: &[domprobe::Scenario],
    _args: &RunArgs,
) -> CliResult<SuiteSummary> {
    if scenarios.is_empty() {
        return Ok(SuiteRunner::new(config, harness).run(scenarios, no_page).await);
    }
    Err(CliError::BrowserUnavailable)
}

async fn no_page() -> CliResult<std::sync::Arc<dyn domprobe::PageDriver>> {
    Err(CliError::BrowserUnavailable)
}

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufRead, BufReader};
use tracing_subscriber::EnvFilter;
use wsdl2rest_harness::artifacts::{ArtifactTracker, ExpectedSet};
use wsdl2rest_harness::cli::{
    Command, ExpectedArgs, ExtractArgs, InitArgs, PollArgs, RootArgs, RunArgs, WatchArgs,
};
use wsdl2rest_harness::config::{default_config, load_settings, resolve_config_path, write_config};
use wsdl2rest_harness::deadline::{race, race_optional, race_with_cleanup};
use wsdl2rest_harness::extract::{ExtractionResult, LogExtractor, RuleSpec};
use wsdl2rest_harness::lines::LossyLines;
use wsdl2rest_harness::poll::{CompletionPattern, FileTextSource, StreamPoller};
use wsdl2rest_harness::scenario::{
    expected_file_list, load_scenario, load_scenarios, write_report, ScenarioRunner,
};
use wsdl2rest_harness::util::display_path;

const REPORT_FILE_NAME: &str = "harness-report.json";

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(dispatch(args.command))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(command: Command) -> Result<ExitCode> {
    match command {
        Command::Init(args) => cmd_init(args),
        Command::Run(args) => cmd_run(args).await,
        Command::Expected(args) => cmd_expected(args),
        Command::Watch(args) => cmd_watch(args).await,
        Command::Poll(args) => cmd_poll(args).await,
        Command::Extract(args) => cmd_extract(args).await,
    }
}

fn cmd_init(args: InitArgs) -> Result<ExitCode> {
    write_config(&args.config, &default_config(), args.force)?;
    println!("wrote {}", args.config.display());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let config_path = resolve_config_path(args.config.as_deref())?;
    let settings = load_settings(&config_path)?;
    let scenarios = if args.scenarios.is_empty() {
        load_scenarios(&settings.test_data_dir)?
    } else {
        args.scenarios
            .iter()
            .map(PathBuf::as_path)
            .map(load_scenario)
            .collect::<Result<Vec<_>>>()?
    };
    if scenarios.is_empty() {
        return Err(anyhow!("no scenarios found in {}", settings.test_data_dir.display()));
    }

    let runner = ScenarioRunner::new(&settings)?;
    let report = runner.run_all(&scenarios).await?;

    for outcome in &report.scenarios {
        let verdict = if outcome.pass { "PASS" } else { "FAIL" };
        println!("{verdict} [{}]", outcome.details);
        for failure in &outcome.failures {
            for line in failure.lines() {
                println!("    {line}");
            }
        }
    }
    println!("{} passed, {} failed", report.pass_count, report.fail_count);

    let out = args.out.unwrap_or_else(|| {
        settings
            .config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(REPORT_FILE_NAME)
    });
    write_report(&out, &report)?;
    tracing::info!(path = %out.display(), "report written");

    Ok(if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_expected(args: ExpectedArgs) -> Result<ExitCode> {
    for rel in expected_file_list(args.framework.into(), args.kind.into()) {
        match &args.workspace {
            Some(workspace) => println!("{}", workspace.join(&rel).display()),
            None => println!("{rel}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_watch(args: WatchArgs) -> Result<ExitCode> {
    let root = std::path::absolute(&args.root)
        .with_context(|| format!("resolve {}", args.root.display()))?;
    let expected = ExpectedSet::under(&root, &args.expect);
    let total = expected.len();
    let mut tracker = ArtifactTracker::start(expected, &root)
        .with_context(|| format!("watch {}", root.display()))?;
    let closer = tracker.closer();
    let waited = race_with_cleanup(
        tracker.completion(),
        Duration::from_millis(args.timeout_ms),
        || {
            if let Some(closer) = &closer {
                closer.close();
            }
        },
    )
    .await;

    match waited {
        Ok(Ok(())) => {
            println!("all {total} expected file(s) present");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(err)) | Err(err) => {
            eprintln!("{err}");
            for path in tracker.missing() {
                println!("missing {}", display_path(&path, Some(root.as_path())));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_poll(args: PollArgs) -> Result<ExitCode> {
    let pattern = match args.pattern.as_deref() {
        Some(pattern) => CompletionPattern::new(pattern, &args.group)?,
        None => CompletionPattern::process_finished(),
    };
    let poller = StreamPoller::new(pattern, Duration::from_millis(args.interval_ms));
    let mut source = FileTextSource::new(&args.file);
    let status = race(
        poller.wait_for_status(&mut source),
        Duration::from_millis(args.timeout_ms),
    )
    .await
    .with_context(|| format!("wait for terminal line in {}", args.file.display()))?;
    println!("{status}");
    Ok(ExitCode::SUCCESS)
}

async fn cmd_extract(args: ExtractArgs) -> Result<ExitCode> {
    let bytes =
        std::fs::read(&args.rules).with_context(|| format!("read {}", args.rules.display()))?;
    let specs: Vec<RuleSpec> = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse rules {}", args.rules.display()))?;
    if specs.is_empty() {
        return Err(anyhow!("{} defines no rules", args.rules.display()));
    }
    let extractor = LogExtractor::from_specs(&specs)?;
    let timeout = args.timeout_ms.map(Duration::from_millis);

    let result = match &args.log {
        Some(log) => {
            let text = std::fs::read(log).with_context(|| format!("read {}", log.display()))?;
            let mut lines = LossyLines::new(text.as_slice());
            extract_lines(extractor, &mut lines, timeout).await?
        }
        None => {
            let mut lines = LossyLines::new(BufReader::new(tokio::io::stdin()));
            extract_lines(extractor, &mut lines, timeout).await?
        }
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("serialize extraction result")?
    );
    Ok(ExitCode::SUCCESS)
}

async fn extract_lines<R>(
    extractor: LogExtractor,
    lines: &mut LossyLines<R>,
    timeout: Option<Duration>,
) -> Result<ExtractionResult>
where
    R: AsyncBufRead + Unpin,
{
    let result = race_optional(extractor.extract(lines), timeout).await??;
    Ok(result)
}

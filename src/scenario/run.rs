//! One scenario, end to end: prepare the workspace, generate, wait for the
//! artifacts, build, run, and check what the runtime reports.
use super::{
    camel_runtime_rules, check_wsdl_url, clear_workspace, prepare_workspace, GenerationType,
    HarnessReport, LoadedScenario, RuntimeOutput, ScenarioOutcome,
};
use crate::artifacts::{ArtifactTracker, ExpectedSet};
use crate::config::Settings;
use crate::deadline::{race, race_optional, race_with_cleanup};
use crate::error::HarnessError;
use crate::manifest::{package_data, PackageData};
use crate::poll::{CompletionPattern, SharedBuffer, StreamPoller};
use crate::process::{echo_lines, pump_lines, BuildCommand, BuildProcess};
use crate::util::{display_path, truncate_string};
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::time::Instant;

const MAX_OUTPUT_IN_FAILURE: usize = 4096;

pub struct ScenarioRunner<'a> {
    settings: &'a Settings,
    manifest: Option<&'static PackageData>,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(settings: &'a Settings) -> Result<Self> {
        let manifest = match settings.manifest.as_deref() {
            Some(path) => Some(package_data(path).context("load extension manifest")?),
            None => None,
        };
        Ok(Self { settings, manifest })
    }

    /// Run every scenario in order. The workspace is created if absent and
    /// removed again afterwards in that case.
    pub async fn run_all(&self, scenarios: &[LoadedScenario]) -> Result<HarnessReport> {
        let workspace = &self.settings.workspace;
        let created = !workspace.exists();
        fs::create_dir_all(workspace)
            .with_context(|| format!("create workspace {}", workspace.display()))?;

        let mut outcomes = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            outcomes.push(self.run(scenario).await);
        }

        if created {
            fs::remove_dir_all(workspace)
                .with_context(|| format!("remove workspace {}", workspace.display()))?;
        }
        HarnessReport::new(outcomes)
    }

    /// Run one scenario. Every failure is recorded on the outcome; nothing
    /// here aborts the remaining scenarios.
    pub async fn run(&self, scenario: &LoadedScenario) -> ScenarioOutcome {
        let started = Instant::now();
        let args = &scenario.args;
        let details = args.details(&self.settings.wsdl_url, &self.settings.wsdl_file);
        tracing::info!(
            scenario = %display_path(&scenario.path, None),
            %details,
            "scenario started"
        );

        let mut outcome = ScenarioOutcome {
            scenario_path: scenario.path.clone(),
            details,
            camel_version: args.camel_version.clone(),
            framework: args.framework,
            kind: args.kind,
            command: None,
            generation_status: None,
            missing_artifacts: Vec::new(),
            build_exit_code: None,
            runtime: None,
            pass: false,
            failures: Vec::new(),
            elapsed_ms: 0,
        };
        if let Err(err) = self.run_stages(scenario, &mut outcome).await {
            outcome.failures.push(format!("{err:#}"));
        }
        if let Err(err) = clear_workspace(&self.settings.workspace) {
            outcome.failures.push(format!("{err:#}"));
        }
        outcome.pass = outcome.failures.is_empty();
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        if outcome.pass {
            tracing::info!(elapsed_ms = outcome.elapsed_ms, "scenario passed");
        } else {
            tracing::warn!(
                elapsed_ms = outcome.elapsed_ms,
                failures = outcome.failures.len(),
                "scenario failed"
            );
        }
        outcome
    }

    async fn run_stages(
        &self,
        scenario: &LoadedScenario,
        outcome: &mut ScenarioOutcome,
    ) -> Result<()> {
        let settings = self.settings;
        let args = &scenario.args;
        let workspace = &settings.workspace;

        if let Some(manifest) = self.manifest {
            let command = manifest
                .find_command(args.kind)
                .ok_or_else(|| anyhow!("extension manifest has no {} command", args.kind))?;
            tracing::debug!(
                command = %command.command,
                title = %command.title,
                "generation command"
            );
            outcome.command = Some(command.command.clone());
        }

        let template = settings.runtimes_dir.join(args.framework.as_str());
        prepare_workspace(workspace, &template)?;

        let expected = ExpectedSet::under(workspace, args.expected_file_list());
        let mut tracker = ArtifactTracker::start(expected, workspace)
            .context("watch workspace for generated files")?;

        let wsdl = match args.kind {
            GenerationType::Url => {
                check_wsdl_url(&settings.wsdl_url).await?;
                settings.wsdl_url.clone()
            }
            GenerationType::File => settings.wsdl_file.display().to_string(),
        };

        let status = self.generate(&wsdl, args.framework.as_str()).await?;
        outcome.generation_status = Some(status);

        let closer = tracker.closer();
        let waited = race_with_cleanup(tracker.completion(), settings.timeouts.artifacts(), || {
            if let Some(closer) = &closer {
                closer.close();
            }
        })
        .await;
        match waited {
            Ok(Ok(())) => {}
            Ok(Err(err)) | Err(err) => {
                let missing: Vec<String> = tracker
                    .missing()
                    .iter()
                    .map(|path| display_path(path, Some(workspace.as_path())))
                    .collect();
                outcome.missing_artifacts = missing.clone();
                return Err(anyhow!(
                    "Test failed to generate ({err}):\n{}",
                    missing.join("\n")
                ));
            }
        }
        drop(tracker);

        let build_code = self.install(&args.camel_version).await?;
        outcome.build_exit_code = Some(build_code);
        if build_code != 0 {
            return Err(anyhow!("maven install exited with code {build_code}"));
        }

        let runtime = self.run_project(args.maven_goal(), &args.camel_version).await?;
        outcome
            .failures
            .extend(runtime.mismatches(args.expected_route_count(), &args.camel_version));
        outcome.runtime = Some(runtime);
        Ok(())
    }

    /// Run the generator and wait for its terminal output line.
    async fn generate(&self, wsdl: &str, framework: &str) -> Result<String> {
        let settings = self.settings;
        let argv = settings.generator_argv(wsdl, framework);
        let Some((program, rest)) = argv.split_first() else {
            return Err(anyhow!("generator command is empty"));
        };
        let command = BuildCommand::new(program, &settings.workspace)
            .args(rest.iter().cloned())
            .resolve()?;
        let mut generator = BuildProcess::spawn(&command)?;

        let buffer = SharedBuffer::new();
        let lines = generator.take_lines();
        let sink = buffer.clone();
        let pump = tokio::spawn(async move {
            if let Some(mut lines) = lines {
                if let Err(err) = pump_lines(&mut lines, &sink).await {
                    tracing::debug!(%err, "generator output unreadable");
                }
            }
            let code = match generator.wait_for_exit().await {
                Ok(code) => code,
                Err(err) => {
                    tracing::debug!(%err, "generator wait failed");
                    -1
                }
            };
            sink.push_line(&format!("Process finished. Return code {code}."));
        });

        let poller = StreamPoller::new(
            CompletionPattern::process_finished(),
            settings.timeouts.poll_interval(),
        );
        let mut source = buffer.clone();
        let status = match race(poller.wait_for_status(&mut source), settings.timeouts.generation())
            .await
        {
            Ok(status) => status,
            Err(err) => {
                pump.abort();
                return Err(generation_failure(&err.to_string(), &buffer));
            }
        };
        if status != "0" {
            return Err(generation_failure(&format!("return code {status}"), &buffer));
        }
        Ok(status)
    }

    /// `build_tool` may carry leading arguments, e.g. `sh ./mvnw`.
    fn build_tool(&self) -> Result<BuildCommand> {
        BuildCommand::from_command_line(&self.settings.build_tool, &self.settings.workspace)?
            .resolve()
    }

    /// `mvn clean install -Dcamel.version=V`, progress logged line by line.
    async fn install(&self, camel_version: &str) -> Result<i32> {
        let settings = self.settings;
        let command = self
            .build_tool()?
            .arg("clean")
            .arg("install")
            .property("camel.version", camel_version);
        let mut build = BuildProcess::spawn(&command)?;
        if let Some(lines) = build.take_lines() {
            tokio::spawn(echo_lines(lines, build.label().to_string()));
        }
        match race_optional(build.wait_for_exit(), settings.timeouts.build()).await {
            Ok(code) => code.map_err(anyhow::Error::from),
            Err(err) => {
                build.force_kill().await?;
                Err(anyhow!("maven install: {err}"))
            }
        }
    }

    /// Start the project and extract what it logs at startup. The runtime is
    /// force-killed afterwards whatever the result.
    async fn run_project(&self, goal: &str, camel_version: &str) -> Result<RuntimeOutput> {
        let settings = self.settings;
        let command = self
            .build_tool()?
            .arg(goal)
            .property("camel.version", camel_version);
        let mut project = BuildProcess::spawn(&command)?;
        let mut lines = project
            .take_lines()
            .ok_or_else(|| anyhow!("runtime stdout unavailable"))?;
        let extractor = camel_runtime_rules()?;
        let extracted = race(extractor.extract(&mut lines), settings.timeouts.runtime()).await;
        drop(lines);
        if let Err(err) = project.force_kill().await {
            tracing::warn!(%err, "failed to stop runtime");
        }

        let result = match extracted {
            Ok(Ok(result)) => result,
            Ok(Err(HarnessError::IncompleteExtraction { unapplied, .. })) => {
                return Err(anyhow!("runtime exited before logging: {}", unapplied.join(", ")));
            }
            Ok(Err(err)) | Err(err) => return Err(anyhow!("runtime log: {err}")),
        };
        RuntimeOutput::from_extraction(&result)
    }
}

fn generation_failure(reason: &str, buffer: &SharedBuffer) -> anyhow::Error {
    anyhow!(
        "Output did not finish with code 0 or timed out ({reason}).\n Error: {}",
        truncate_string(&buffer.contents(), MAX_OUTPUT_IN_FAILURE)
    )
}

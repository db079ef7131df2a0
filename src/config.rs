//! Harness configuration.
//!
//! Loads, validates, and resolves the `harness.json` file. Relative paths
//! resolve against the directory holding the config so a checked-in config
//! works from any cwd.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "harness.json";
pub const GENERATOR_COMMAND_ENV: &str = "W2R_GENERATOR_COMMAND";

/// Placeholders substituted into the generator command.
pub const GENERATOR_PLACEHOLDERS: &[&str] = &[
    "{wsdl}",
    "{workspace}",
    "{output}",
    "{framework}",
    "{jaxrs}",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub generation_ms: u64,
    pub artifacts_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_ms: Option<u64>,
    pub runtime_ms: u64,
    /// Zero means "yield to the runtime between samples".
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            generation_ms: 13_500,
            artifacts_ms: 8_000,
            build_ms: None,
            runtime_ms: 30_000,
            poll_interval_ms: 0,
        }
    }
}

impl Timeouts {
    pub fn generation(&self) -> Duration {
        Duration::from_millis(self.generation_ms)
    }

    pub fn artifacts(&self) -> Duration {
        Duration::from_millis(self.artifacts_ms)
    }

    pub fn build(&self) -> Option<Duration> {
        self.build_ms.map(Duration::from_millis)
    }

    pub fn runtime(&self) -> Duration {
        Duration::from_millis(self.runtime_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub schema_version: u32,
    pub workspace: PathBuf,
    pub runtimes_dir: PathBuf,
    pub test_data_dir: PathBuf,
    pub wsdl_file: PathBuf,
    pub wsdl_url: String,
    /// Extension manifest (`package.json`) used to name the generation command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    pub generator: Vec<String>,
    #[serde(default = "default_build_tool")]
    pub build_tool: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_jaxrs_endpoint")]
    pub jaxrs_endpoint: String,
    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_build_tool() -> String {
    "mvn".to_string()
}

fn default_output_dir() -> String {
    "src/main/java".to_string()
}

fn default_jaxrs_endpoint() -> String {
    "http://localhost:8000/jaxrs".to_string()
}

fn default_generator() -> Vec<String> {
    [
        "wsdl2rest",
        "--wsdl",
        "{wsdl}",
        "--out",
        "{output}",
        "--camel-context",
        "{framework}",
        "--jaxrs",
        "{jaxrs}",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

/// Build the default config written by `init`.
pub fn default_config() -> HarnessConfig {
    HarnessConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        workspace: PathBuf::from(".ui-testing"),
        runtimes_dir: PathBuf::from("runtimes"),
        test_data_dir: PathBuf::from("test-data"),
        wsdl_file: PathBuf::from("address.wsdl"),
        wsdl_url: "http://localhost:3000/helloworld?wsdl".to_string(),
        manifest: None,
        generator: default_generator(),
        build_tool: default_build_tool(),
        output_dir: default_output_dir(),
        jaxrs_endpoint: default_jaxrs_endpoint(),
        timeouts: Timeouts::default(),
    }
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> String {
    let config = default_config();
    serde_json::to_string_pretty(&config).expect("serialize config stub")
}

pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: HarnessConfig =
        serde_json::from_slice(&bytes).context("parse harness config JSON")?;
    Ok(config)
}

/// Persist a config in a stable JSON format. Refuses to replace an existing
/// file unless `force` is set.
pub fn write_config(path: &Path, config: &HarnessConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config).context("serialize harness config")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &HarnessConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported harness config schema_version {}",
            config.schema_version
        ));
    }
    if config.generator.is_empty() || config.generator[0].trim().is_empty() {
        return Err(anyhow!("generator must name a program"));
    }
    if config.build_tool.trim().is_empty() {
        return Err(anyhow!("build_tool must be non-empty"));
    }
    let output = Path::new(&config.output_dir);
    if output.is_absolute()
        || output
            .components()
            .any(|component| matches!(component, std::path::Component::ParentDir))
    {
        return Err(anyhow!(
            "output_dir must be a relative path without '..' (got {:?})",
            config.output_dir
        ));
    }
    for (label, value) in [
        ("generation_ms", config.timeouts.generation_ms),
        ("artifacts_ms", config.timeouts.artifacts_ms),
        ("runtime_ms", config.timeouts.runtime_ms),
    ] {
        if value == 0 {
            return Err(anyhow!("timeouts.{label} must be greater than zero"));
        }
    }
    if config.timeouts.build_ms == Some(0) {
        return Err(anyhow!("timeouts.build_ms must be greater than zero when set"));
    }
    Ok(())
}

/// Pick the config file: explicit flag, then `./harness.json`, then the
/// per-user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let local = env::current_dir()
        .context("resolve cwd")?
        .join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(local);
    }
    if let Some(user) = dirs::config_dir()
        .map(|dir| dir.join("wsdl2rest-harness").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
    {
        return Ok(user);
    }
    Err(anyhow!(
        "no {CONFIG_FILE_NAME} found (pass --config or run `w2r-harness init`)"
    ))
}

/// A validated config with every path made absolute.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub workspace: PathBuf,
    pub runtimes_dir: PathBuf,
    pub test_data_dir: PathBuf,
    pub wsdl_file: PathBuf,
    pub wsdl_url: String,
    pub manifest: Option<PathBuf>,
    pub generator: Vec<String>,
    pub build_tool: String,
    pub output_dir: String,
    pub jaxrs_endpoint: String,
    pub timeouts: Timeouts,
}

impl Settings {
    pub fn from_config(config: HarnessConfig, config_path: &Path) -> Result<Self> {
        validate_config(&config)?;
        let config_path = absolutize(config_path)?;
        let base = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let resolve = |path: &Path| base.join(path);
        let generator = match env::var(GENERATOR_COMMAND_ENV) {
            Ok(raw) if !raw.trim().is_empty() => parse_generator_override(&raw)?,
            _ => config.generator.clone(),
        };
        Ok(Self {
            workspace: resolve(&config.workspace),
            runtimes_dir: resolve(&config.runtimes_dir),
            test_data_dir: resolve(&config.test_data_dir),
            wsdl_file: resolve(&config.wsdl_file),
            manifest: config.manifest.as_deref().map(resolve),
            wsdl_url: config.wsdl_url,
            generator,
            build_tool: config.build_tool,
            output_dir: config.output_dir,
            jaxrs_endpoint: config.jaxrs_endpoint,
            timeouts: config.timeouts,
            config_path,
        })
    }

    /// Generator argv with placeholders substituted.
    pub fn generator_argv(&self, wsdl: &str, framework: &str) -> Vec<String> {
        let workspace = self.workspace.display().to_string();
        let output = self.workspace.join(&self.output_dir).display().to_string();
        self.generator
            .iter()
            .map(|arg| {
                arg.replace("{wsdl}", wsdl)
                    .replace("{workspace}", &workspace)
                    .replace("{output}", &output)
                    .replace("{framework}", framework)
                    .replace("{jaxrs}", &self.jaxrs_endpoint)
            })
            .collect()
    }
}

/// Load, validate, and resolve the config at `path`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let config = load_config(path)?;
    Settings::from_config(config, path)
        .with_context(|| format!("invalid config {}", path.display()))
}

fn parse_generator_override(raw: &str) -> Result<Vec<String>> {
    let argv = shell_words::split(raw).with_context(|| format!("parse {GENERATOR_COMMAND_ENV}"))?;
    if argv.is_empty() {
        return Err(anyhow!("{GENERATOR_COMMAND_ENV} is empty"));
    }
    Ok(argv)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(env::current_dir().context("resolve cwd")?.join(path))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

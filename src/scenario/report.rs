use super::{GenerationType, Runtime, RuntimeOutput};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_path: PathBuf,
    pub details: String,
    pub camel_version: String,
    pub framework: Runtime,
    #[serde(rename = "type")]
    pub kind: GenerationType,
    /// Extension command that would trigger this generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeOutput>,
    pub pass: bool,
    pub failures: Vec<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    pub scenarios: Vec<ScenarioOutcome>,
    pub pass_count: usize,
    pub fail_count: usize,
}

impl HarnessReport {
    pub fn new(scenarios: Vec<ScenarioOutcome>) -> Result<Self> {
        let pass_count = scenarios.iter().filter(|outcome| outcome.pass).count();
        Ok(Self {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at_epoch_ms: now_epoch_ms()?,
            fail_count: scenarios.len() - pass_count,
            pass_count,
            scenarios,
        })
    }

    pub fn all_passed(&self) -> bool {
        self.fail_count == 0
    }
}

pub fn now_epoch_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("compute timestamp")?
        .as_millis())
}

/// Write the report through a sibling temp file so readers never see a
/// partial document.
pub fn write_report(path: &Path, report: &HarnessReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("report.json");
    let tmp_path = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    let mut text = serde_json::to_string_pretty(report).context("serialize report")?;
    text.push('\n');
    fs::write(&tmp_path, text.as_bytes())
        .with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(pass: bool) -> ScenarioOutcome {
        ScenarioOutcome {
            scenario_path: PathBuf::from("test-data/spring-file.json"),
            details: "file = address.wsdl, spring, camel = 3.4.0".to_string(),
            camel_version: "3.4.0".to_string(),
            framework: Runtime::Spring,
            kind: GenerationType::File,
            command: Some("wsdl2rest.generate.local".to_string()),
            generation_status: Some("0".to_string()),
            missing_artifacts: Vec::new(),
            build_exit_code: Some(0),
            runtime: None,
            pass,
            failures: if pass {
                Vec::new()
            } else {
                vec!["Camel version mismatch".to_string()]
            },
            elapsed_ms: 1200,
        }
    }

    #[test]
    fn counts_passes_and_failures() {
        let report = HarnessReport::new(vec![outcome(true), outcome(false), outcome(true)])
            .expect("report");
        assert_eq!(report.pass_count, 2);
        assert_eq!(report.fail_count, 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn write_replaces_existing_report_atomically() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out").join("report.json");
        write_report(&path, &HarnessReport::new(vec![outcome(false)]).expect("report"))
            .expect("first write");
        write_report(&path, &HarnessReport::new(vec![outcome(true)]).expect("report"))
            .expect("second write");

        let text = fs::read_to_string(&path).expect("read report");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse report");
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["pass_count"], 1);
        assert_eq!(value["scenarios"][0]["type"], "file");
        assert!(value["scenarios"][0].get("missing_artifacts").is_none());
        assert!(!temp.path().join("out").join(".report.json.tmp").exists());
    }
}

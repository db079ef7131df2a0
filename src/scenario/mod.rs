//! Scenario model and discovery.
//!
//! A scenario is one `{camelVersion, framework, type}` combination read from
//! the test-data directory. Everything the run needs to check (artifact
//! list, route count, Maven goal) is derived from those three fields.
mod preflight;
mod report;
mod run;
mod runtime;
mod workspace;

pub use preflight::check_wsdl_url;
pub use report::{now_epoch_ms, write_report, HarnessReport, ScenarioOutcome, REPORT_SCHEMA_VERSION};
pub use run::ScenarioRunner;
pub use runtime::{camel_runtime_rules, RuntimeOutput};
pub use workspace::{clear_workspace, prepare_workspace};

use crate::walk::walk;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const COMMON_FILES: &[&str] = &["wsdl2rest.readme.md", "config/logging.properties"];

const FILE_SOURCE_ROOT: &str = "src/main/java/org/jboss/fuse/wsdl2rest/test/doclit";
const FILE_CLASSES: &[&str] = &[
    "AddAddress",
    "AddAddressResponse",
    "Address",
    "AddressService",
    "DelAddress",
    "DelAddressResponse",
    "GetAddress",
    "GetAddressResponse",
    "Item",
    "ListAddresses",
    "ListAddressesResponse",
    "ObjectFactory",
    "package-info",
    "UpdAddress",
    "UpdAddressResponse",
];

const URL_SOURCE_ROOT: &str = "src/main/java/org/helloworld/test/rpclit";
const URL_CLASSES: &[&str] = &["HelloPortType", "HelloService"];

/// Camel DSL the generator emits configuration for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Spring,
    Blueprint,
}

impl Runtime {
    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Spring => "spring",
            Runtime::Blueprint => "blueprint",
        }
    }

    pub fn camel_context_path(self) -> &'static str {
        match self {
            Runtime::Spring => "src/main/resources/META-INF/spring/camel-context.xml",
            Runtime::Blueprint => "src/main/resources/OSGI-INF/blueprint/blueprint.xml",
        }
    }

    pub fn maven_goal(self) -> &'static str {
        match self {
            Runtime::Spring => "exec:java",
            Runtime::Blueprint => "camel:run",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the WSDL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Url,
    File,
}

impl GenerationType {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationType::Url => "url",
            GenerationType::File => "file",
        }
    }

    /// Generated Java sources land here, relative to the workspace.
    pub fn source_root(self) -> &'static str {
        match self {
            GenerationType::Url => URL_SOURCE_ROOT,
            GenerationType::File => FILE_SOURCE_ROOT,
        }
    }

    fn classes(self) -> &'static [&'static str] {
        match self {
            GenerationType::Url => URL_CLASSES,
            GenerationType::File => FILE_CLASSES,
        }
    }

    /// Routes the generated camel context defines.
    pub fn expected_route_count(self) -> u32 {
        match self {
            GenerationType::Url => 2,
            GenerationType::File => 10,
        }
    }
}

impl fmt::Display for GenerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioArgs {
    pub camel_version: String,
    pub framework: Runtime,
    #[serde(rename = "type")]
    pub kind: GenerationType,
}

impl ScenarioArgs {
    pub fn camel_context_path(&self) -> &'static str {
        self.framework.camel_context_path()
    }

    pub fn maven_goal(&self) -> &'static str {
        self.framework.maven_goal()
    }

    pub fn expected_route_count(&self) -> u32 {
        self.kind.expected_route_count()
    }

    /// Workspace-relative files the generator must create.
    pub fn expected_file_list(&self) -> Vec<String> {
        expected_file_list(self.framework, self.kind)
    }

    /// One-line description used in logs and the report.
    pub fn details(&self, wsdl_url: &str, wsdl_file: &Path) -> String {
        let source = match self.kind {
            GenerationType::Url => format!("url = {wsdl_url}"),
            GenerationType::File => format!("file = {}", wsdl_file.display()),
        };
        format!("{source}, {}, camel = {}", self.framework, self.camel_version)
    }
}

pub fn expected_file_list(framework: Runtime, kind: GenerationType) -> Vec<String> {
    let mut files: Vec<String> = COMMON_FILES.iter().map(|rel| rel.to_string()).collect();
    files.push(framework.camel_context_path().to_string());
    let root = kind.source_root();
    files.extend(kind.classes().iter().map(|class| format!("{root}/{class}.java")));
    files
}

/// A scenario and the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub path: PathBuf,
    pub args: ScenarioArgs,
}

pub fn load_scenario(path: &Path) -> Result<LoadedScenario> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return Err(anyhow!("{} is not json file", path.display()));
    }
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let args: ScenarioArgs = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse scenario {}", path.display()))?;
    if args.camel_version.trim().is_empty() {
        return Err(anyhow!("{}: camelVersion is required", path.display()));
    }
    Ok(LoadedScenario {
        path: path.to_path_buf(),
        args,
    })
}

/// Every scenario under `dir`, sorted by path. Any non-JSON file is an error.
pub fn load_scenarios(dir: &Path) -> Result<Vec<LoadedScenario>> {
    let mut paths = walk(dir)
        .with_context(|| format!("walk test data {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("walk test data {}", dir.display()))?;
    paths.sort();
    paths.iter().map(PathBuf::as_path).map(load_scenario).collect()
}

//! Extension manifest (`package.json`) lookups.
//!
//! The manifest is read at most once per process and never invalidated.
use crate::scenario::GenerationType;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub command: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Contributes {
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageData {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub contributes: Option<Contributes>,
}

impl PackageData {
    /// The command that generates from a WSDL of the given kind: ids ending
    /// in `url` for remote WSDLs, `local` for files.
    pub fn find_command(&self, kind: GenerationType) -> Option<&Command> {
        let suffix = match kind {
            GenerationType::Url => "url",
            GenerationType::File => "local",
        };
        self.contributes
            .as_ref()?
            .commands
            .iter()
            .find(|command| command.command.ends_with(suffix))
    }
}

pub fn load_package_data(path: &Path) -> Result<PackageData> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

static PACKAGE_DATA: OnceLock<PackageData> = OnceLock::new();

/// Process-wide manifest. The first successful load wins; later calls return
/// it regardless of `path`.
pub fn package_data(path: &Path) -> Result<&'static PackageData> {
    if let Some(data) = PACKAGE_DATA.get() {
        return Ok(data);
    }
    let data = load_package_data(path)?;
    let _ = PACKAGE_DATA.set(data);
    PACKAGE_DATA
        .get()
        .ok_or_else(|| anyhow!("package data unavailable"))
}

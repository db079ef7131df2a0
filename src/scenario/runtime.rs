use crate::error::Result;
use crate::extract::{ExtractionResult, LogExtractor, LogRule};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const TOTAL_ROUTES_PATTERN: &str =
    r".*Total (?P<totalRoutes>\d+) routes, of which (?P<startedRoutes>\d+) are started";
const CAMEL_STARTED_PATTERN: &str =
    r".*Apache Camel (?P<camelVersion>\d+\.\d+\.\d+(|\.[a-zA-Z0-9_-]+)) \(CamelContext: .+\) started in.*";

/// The two startup lines a Camel runtime prints, in the order it prints them.
pub fn camel_runtime_rules() -> Result<LogExtractor> {
    Ok(LogExtractor::new(vec![
        LogRule::labeled("route totals", TOTAL_ROUTES_PATTERN)?,
        LogRule::labeled("camel started", CAMEL_STARTED_PATTERN)?,
    ]))
}

/// What a running generated project reported about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeOutput {
    pub total_routes: u32,
    pub started_routes: u32,
    pub camel_version: String,
}

impl RuntimeOutput {
    pub fn from_extraction(result: &ExtractionResult) -> anyhow::Result<Self> {
        let field = |name: &str| {
            result
                .get(name)
                .ok_or_else(|| anyhow!("runtime log did not report {name}"))
        };
        let count = |name: &str| -> anyhow::Result<u32> {
            let raw = field(name)?;
            raw.parse()
                .with_context(|| format!("{name} is not a route count: {raw:?}"))
        };
        Ok(Self {
            total_routes: count("totalRoutes")?,
            started_routes: count("startedRoutes")?,
            camel_version: field("camelVersion")?.to_string(),
        })
    }

    /// Assertion-style mismatches against what the scenario expects.
    pub fn mismatches(&self, expected_routes: u32, camel_version: &str) -> Vec<String> {
        let mut failures = Vec::new();
        if self.started_routes != expected_routes {
            failures.push(format!(
                "All routes were not started: expected {expected_routes}, got {}",
                self.started_routes
            ));
        }
        if self.total_routes != expected_routes {
            failures.push(format!(
                "Number of routes does not match: expected {expected_routes}, got {}",
                self.total_routes
            ));
        }
        if self.camel_version != camel_version {
            failures.push(format!(
                "Camel version mismatch: expected {camel_version}, got {}",
                self.camel_version
            ));
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(lines: &[&str]) -> ExtractionResult {
        let mut extractor = camel_runtime_rules().expect("rules compile");
        for line in lines {
            extractor.feed(line);
        }
        extractor.finish().expect("complete")
    }

    #[test]
    fn parses_spring_boot_style_startup() {
        let result = extract(&[
            "[INFO] --- camel-maven-plugin:3.4.0:run (default-cli) @ wsdl2rest-test ---",
            "INFO  DefaultCamelContext - Total 10 routes, of which 10 are started",
            "INFO  DefaultCamelContext - Apache Camel 3.4.0 (CamelContext: camel-1) started in 1.204 seconds",
        ]);
        let output = RuntimeOutput::from_extraction(&result).expect("parse");
        assert_eq!(
            output,
            RuntimeOutput {
                total_routes: 10,
                started_routes: 10,
                camel_version: "3.4.0".to_string(),
            }
        );
        assert!(output.mismatches(10, "3.4.0").is_empty());
    }

    #[test]
    fn reports_every_mismatch() {
        let output = RuntimeOutput {
            total_routes: 2,
            started_routes: 1,
            camel_version: "2.21.0.fuse-730078".to_string(),
        };
        let failures = output.mismatches(2, "3.4.0");
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("All routes were not started"));
        assert!(failures[1].starts_with("Camel version mismatch"));
    }

    #[test]
    fn missing_field_is_an_error() {
        let mut partial = LogExtractor::new(vec![
            LogRule::new(TOTAL_ROUTES_PATTERN).expect("rule"),
        ]);
        partial.feed("Total 3 routes, of which 3 are started");
        let result = partial.finish().expect("complete");
        let err = RuntimeOutput::from_extraction(&result).expect_err("no version");
        assert!(err.to_string().contains("camelVersion"));
    }
}

//! Ordered structured-log extraction.
//!
//! A fixed list of rules is tried against every incoming line. Each line can
//! apply at most one rule (the first unapplied rule in list order that
//! matches), each rule applies at most once, and extraction is complete once
//! every rule has applied. Captured values stay strings; interpreting them
//! is the caller's job.
use crate::error::{HarnessError, Result};
use crate::lines::LossyLines;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::AsyncBufRead;

/// Named captures accumulated across all applied rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    fields: BTreeMap<String, String>,
}

impl ExtractionResult {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    fn insert(&mut self, field: &str, value: &str) {
        self.fields.insert(field.to_string(), value.to_string());
    }
}

/// Serializable rule definition, as read from a rules file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogRule {
    label: String,
    pattern: Regex,
    applied: bool,
}

impl LogRule {
    /// Compile a rule; the pattern itself is its label.
    pub fn new(pattern: &str) -> Result<Self> {
        Self::labeled(pattern, pattern)
    }

    pub fn labeled(label: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|err| HarnessError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            label: label.to_string(),
            pattern: regex,
            applied: false,
        })
    }

    pub fn from_spec(spec: &RuleSpec) -> Result<Self> {
        match spec.label.as_deref() {
            Some(label) => Self::labeled(label, &spec.pattern),
            None => Self::new(&spec.pattern),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Named groups this rule can contribute.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.pattern.capture_names().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct LogExtractor {
    rules: Vec<LogRule>,
    result: ExtractionResult,
    lines_seen: u64,
}

impl LogExtractor {
    pub fn new(rules: Vec<LogRule>) -> Self {
        Self {
            rules,
            result: ExtractionResult::default(),
            lines_seen: 0,
        }
    }

    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .map(LogRule::from_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Offer one line. Returns the index of the rule it applied, if any.
    pub fn feed(&mut self, line: &str) -> Option<usize> {
        self.lines_seen += 1;
        let (index, rule) = self
            .rules
            .iter_mut()
            .enumerate()
            .filter(|(_, rule)| !rule.applied)
            .find(|(_, rule)| rule.pattern.is_match(line))?;
        if let Some(caps) = rule.pattern.captures(line) {
            for name in rule.pattern.capture_names().flatten() {
                if let Some(value) = caps.name(name) {
                    self.result.insert(name, value.as_str());
                }
            }
        }
        rule.applied = true;
        tracing::debug!(rule = %rule.label, line = self.lines_seen, "log rule applied");
        Some(index)
    }

    pub fn is_complete(&self) -> bool {
        self.rules.iter().all(LogRule::is_applied)
    }

    pub fn rules(&self) -> &[LogRule] {
        &self.rules
    }

    /// Labels of rules that have not matched yet, in declaration order.
    pub fn unapplied(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| !rule.applied)
            .map(|rule| rule.label.clone())
            .collect()
    }

    pub fn result(&self) -> &ExtractionResult {
        &self.result
    }

    /// Close the extraction: the full result if complete, otherwise
    /// `IncompleteExtraction` with the unapplied rules.
    pub fn finish(self) -> Result<ExtractionResult> {
        if self.is_complete() {
            return Ok(self.result);
        }
        Err(HarnessError::IncompleteExtraction {
            unapplied: self.unapplied(),
            partial: self.result,
        })
    }

    /// Feed lines in emission order until every rule applied or the source
    /// ends. Lines after completion are left unread in `lines`.
    pub async fn extract<R>(mut self, lines: &mut LossyLines<R>) -> Result<ExtractionResult>
    where
        R: AsyncBufRead + Unpin,
    {
        while !self.is_complete() {
            match lines.next_line().await? {
                Some(line) => {
                    self.feed(&line);
                }
                None => {
                    tracing::debug!(lines = self.lines_seen, "line source ended");
                    break;
                }
            }
        }
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL_ROUTES: &str =
        r".*Total (?P<totalRoutes>\d+) routes, of which (?P<startedRoutes>\d+) are started";
    const CAMEL_STARTED: &str = r".*Apache Camel (?P<camelVersion>\d+\.\d+\.\d+(|\.[a-zA-Z0-9_-]+)) \(CamelContext: .+\) started in.*";

    fn camel_extractor() -> LogExtractor {
        LogExtractor::new(vec![
            LogRule::labeled("route totals", TOTAL_ROUTES).expect("routes rule"),
            LogRule::labeled("camel started", CAMEL_STARTED).expect("camel rule"),
        ])
    }

    #[test]
    fn extracts_fields_from_both_rules() {
        let mut extractor = camel_extractor();
        for line in [
            "foo",
            "Total 10 routes, of which 10 are started",
            "Apache Camel 3.4.0 (CamelContext: x) started in 2s",
        ] {
            extractor.feed(line);
        }
        let result = extractor.finish().expect("complete");
        assert_eq!(result.len(), 3);
        assert_eq!(result.get("totalRoutes"), Some("10"));
        assert_eq!(result.get("startedRoutes"), Some("10"));
        assert_eq!(result.get("camelVersion"), Some("3.4.0"));
    }

    #[test]
    fn qualifier_suffix_is_part_of_the_version() {
        let mut extractor = camel_extractor();
        extractor.feed(
            "[main] INFO Apache Camel 2.21.0.fuse-730078 (CamelContext: camel-1) started in 0.912 seconds",
        );
        assert_eq!(extractor.result().get("camelVersion"), Some("2.21.0.fuse-730078"));
    }

    #[test]
    fn one_rule_per_line_in_declaration_order() {
        let mut extractor = LogExtractor::new(vec![
            LogRule::new(r"started (?P<first>\w+)").expect("first"),
            LogRule::new(r"(?P<second>started) \w+").expect("second"),
        ]);
        assert_eq!(extractor.feed("started camel"), Some(0));
        assert_eq!(extractor.result().get("second"), None);
        assert_eq!(extractor.feed("started camel"), Some(1));
        assert_eq!(extractor.feed("started camel"), None);
        assert!(extractor.is_complete());
    }

    #[test]
    fn ended_source_lists_unapplied_rules() {
        let mut extractor = camel_extractor();
        extractor.feed("Total 2 routes, of which 2 are started");
        match extractor.finish() {
            Err(HarnessError::IncompleteExtraction { unapplied, partial }) => {
                assert_eq!(unapplied, vec!["camel started".to_string()]);
                assert_eq!(partial.get("totalRoutes"), Some("2"));
            }
            other => panic!("expected incomplete extraction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn extract_stops_reading_once_complete() {
        let log = b"[INFO] Scanning for projects...\n\
Total 2 routes, of which 2 are started\n\
Apache Camel 3.4.0 (CamelContext: camel-1) started in 1.1 seconds\n\
trailing line\n";
        let mut lines = LossyLines::new(&log[..]);
        let result = camel_extractor().extract(&mut lines).await.expect("complete");
        assert_eq!(result.get("startedRoutes"), Some("2"));
        assert_eq!(
            lines.next_line().await.expect("read"),
            Some("trailing line".to_string())
        );
    }

    #[tokio::test]
    async fn undecodable_bytes_do_not_end_the_log() {
        let log = b"[INFO] Building caf\xe9 module\n\
Total 2 routes, of which 2 are started\n\
Apache Camel 3.4.0 (CamelContext: camel-1) started in 1.1 seconds\n";
        let mut lines = LossyLines::new(&log[..]);
        let result = camel_extractor().extract(&mut lines).await.expect("complete");
        assert_eq!(result.get("totalRoutes"), Some("2"));
        assert_eq!(result.get("camelVersion"), Some("3.4.0"));
    }

    #[tokio::test]
    async fn extract_fails_when_source_closes_early() {
        let log = b"Total 2 routes, of which 2 are started\n";
        let mut lines = LossyLines::new(&log[..]);
        let err = camel_extractor()
            .extract(&mut lines)
            .await
            .expect_err("incomplete");
        assert!(err.to_string().contains("camel started"));
    }

    #[test]
    fn rule_specs_deserialize_with_optional_label() {
        let specs: Vec<RuleSpec> = serde_json::from_str(
            r#"[{"pattern": "Total (?P<n>\\d+)"}, {"pattern": "v(?P<v>\\S+)", "label": "version"}]"#,
        )
        .expect("parse specs");
        let extractor = LogExtractor::from_specs(&specs).expect("compile specs");
        let labels: Vec<_> = extractor.rules().iter().map(LogRule::label).collect();
        assert_eq!(labels, vec!["Total (?P<n>\\d+)", "version"]);
    }
}

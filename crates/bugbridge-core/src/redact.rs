//! Redaction policy engine.
//!
//! Decides whether an issue's metadata may be surfaced publicly, using the
//! owning tracker's ordered `redact` and `redact_exemption` tables.
//!
//! # Algorithm
//!
//! 1. Build the issue's match string from title, project, component,
//!    version, classification and keywords, in that order.
//! 2. The first exemption rule that matches with a truthy value exempts
//!    the issue outright.
//! 3. Otherwise collect match strings for the issue and for every
//!    duplicate and original that is not itself exempt. An exempt relation
//!    is dropped entirely.
//! 4. Scan the redact table in order; the first rule matching any retained
//!    string decides. The issue's own string is tried before its relations.
//!
//! Evaluation never fails: a field the tracker cannot produce is treated as
//! empty.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::config::RuleConfig;
use crate::error::{Result, TrackerError};
use crate::model::Issue;

/// Pattern that every match string satisfies.
pub const CATCH_ALL: &str = ".*";

/// One ordered `(pattern, value)` entry.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    value: bool,
}

impl Rule {
    /// Compile a rule.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidPattern`] when `pattern` is not a valid
    /// regular expression.
    pub fn new(pattern: &str, value: bool) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|e| TrackerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: compiled,
            value,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    #[must_use]
    pub const fn value(&self) -> bool {
        self.value
    }

    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.pattern() == CATCH_ALL
    }

    #[must_use]
    pub fn is_match(&self, haystack: &str) -> bool {
        self.pattern.is_match(haystack)
    }
}

/// The two ordered rule tables a tracker owns.
#[derive(Debug, Clone, Default)]
pub struct RedactionRules {
    redact: Vec<Rule>,
    exemption: Vec<Rule>,
}

impl RedactionRules {
    #[must_use]
    pub const fn new(redact: Vec<Rule>, exemption: Vec<Rule>) -> Self {
        Self { redact, exemption }
    }

    /// Compile both tables from configuration, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidPattern`] for the first bad pattern.
    pub fn compile(redact: &[RuleConfig], exemption: &[RuleConfig]) -> Result<Self> {
        let compile = |rules: &[RuleConfig]| -> Result<Vec<Rule>> {
            rules
                .iter()
                .map(|rule| Rule::new(&rule.pattern, rule.value))
                .collect()
        };
        Ok(Self {
            redact: compile(redact)?,
            exemption: compile(exemption)?,
        })
    }

    #[must_use]
    pub fn redact(&self) -> &[Rule] {
        &self.redact
    }

    #[must_use]
    pub fn exemption(&self) -> &[Rule] {
        &self.exemption
    }

    fn exempting_rule(&self, match_string: &str) -> Option<&Rule> {
        self.exemption
            .iter()
            .find(|rule| rule.value && rule.is_match(match_string))
    }
}

/// Outcome of a redaction decision. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Redaction {
    pub redacted: bool,
    pub reason: Option<String>,
    /// Set when an exemption rule decided the outcome.
    pub exemption: bool,
}

impl fmt::Display for Redaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.redacted { "redacted" } else { "not redacted" };
        match &self.reason {
            Some(reason) => write!(f, "{verdict}: {reason}"),
            None => f.write_str(verdict),
        }
    }
}

/// Compose the tagged string redaction patterns are matched against.
///
/// Absent fields render as `None`.
#[must_use]
pub fn compose_match_string(
    title: &str,
    project: Option<&str>,
    component: Option<&str>,
    version: Option<&str>,
    classification: Option<&str>,
    keywords: &[String],
) -> String {
    let mut result = String::new();
    for (member, value) in [
        ("title", Some(title)),
        ("project", project),
        ("component", component),
        ("version", version),
        ("classification", classification),
    ] {
        result.push_str(&format!(";{member}:{}", value.unwrap_or("None")));
    }
    format!("{result};keywords:{}", keywords.join(","))
}

/// Match string for `issue`, fetching fields through its tracker.
#[must_use]
pub fn match_string(issue: &Issue) -> String {
    let keywords = issue.keywords().unwrap_or_default();
    compose_match_string(
        &issue.title().unwrap_or_default(),
        issue.project().ok().flatten().as_deref(),
        issue.component().ok().flatten().as_deref(),
        issue.version().ok().flatten().as_deref(),
        issue.classification().ok().flatten().as_deref(),
        &keywords,
    )
}

fn reason_for(rule: &Rule, tracker_name: &str, related_link: Option<&str>) -> String {
    if rule.is_catch_all() {
        return format!("is a {tracker_name}");
    }
    match related_link {
        Some(link) => format!("is related to {link} which matches '{}'", rule.pattern()),
        None => format!("matches '{}'", rule.pattern()),
    }
}

/// Evaluate the redaction policy for `issue`.
#[must_use]
pub fn evaluate(issue: &Issue) -> Redaction {
    let tracker = issue.tracker();
    let rules = tracker.redaction_rules();
    let tracker_name = &tracker.identity().name;
    let own = match_string(issue);

    if let Some(rule) = rules.exempting_rule(&own) {
        debug!(issue = issue.id(), pattern = rule.pattern(), "issue exempt from redaction");
        return Redaction {
            redacted: false,
            reason: Some(reason_for(rule, tracker_name, None)),
            exemption: rule.value(),
        };
    }

    let own_link = issue.link().unwrap_or_default();
    let mut relations: Vec<(String, String)> = Vec::new();
    let candidates = issue
        .duplicates()
        .unwrap_or_default()
        .into_iter()
        .chain(issue.original().ok().flatten());
    for related in candidates {
        let link = related.link().unwrap_or_default();
        if link == own_link || relations.iter().any(|(seen, _)| *seen == link) {
            continue;
        }
        let related_string = match_string(&related);
        if rules.exempting_rule(&related_string).is_some() {
            debug!(issue = issue.id(), %link, "related issue exempt, ignoring");
            continue;
        }
        relations.push((link, related_string));
    }

    let retained = std::iter::once((None, own.as_str()))
        .chain(relations.iter().map(|(link, s)| (Some(link.as_str()), s.as_str())));
    for (related_link, candidate) in retained {
        if let Some(rule) = rules.redact().iter().find(|rule| rule.is_match(candidate)) {
            return Redaction {
                redacted: rule.value(),
                reason: Some(reason_for(rule, tracker_name, related_link)),
                exemption: false,
            };
        }
    }

    Redaction::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_string_field_order() {
        let s = compose_match_string(
            "Crash in parser",
            Some("WebKit"),
            Some("JavaScriptCore"),
            Some("Other"),
            None,
            &["InRadar".to_string(), "Regression".to_string()],
        );
        assert_eq!(
            s,
            ";title:Crash in parser;project:WebKit;component:JavaScriptCore;\
             version:Other;classification:None;keywords:InRadar,Regression"
        );
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Rule::new("(unclosed", true).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidPattern { .. }));
    }

    #[test]
    fn compile_preserves_order() {
        let rules = RedactionRules::compile(
            &[
                RuleConfig::new("component:Security", true),
                RuleConfig::new(CATCH_ALL, false),
            ],
            &[RuleConfig::new("keywords:.*Public", true)],
        )
        .unwrap();
        let patterns: Vec<_> = rules.redact().iter().map(Rule::pattern).collect();
        assert_eq!(patterns, ["component:Security", ".*"]);
        assert!(rules.redact()[1].is_catch_all());
        assert_eq!(rules.exemption().len(), 1);
    }

    #[test]
    fn falsy_exemption_does_not_exempt() {
        let rules =
            RedactionRules::new(vec![], vec![Rule::new("title:", false).unwrap()]);
        assert!(rules.exempting_rule(";title:x").is_none());
    }

    #[test]
    fn display_includes_reason() {
        let r = Redaction {
            redacted: true,
            reason: Some("matches 'Security'".into()),
            exemption: false,
        };
        assert_eq!(r.to_string(), "redacted: matches 'Security'");
        assert_eq!(Redaction::default().to_string(), "not redacted");
    }
}

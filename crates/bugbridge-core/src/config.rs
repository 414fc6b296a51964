use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::redact::RedactionRules;
use crate::tracker::TrackerIdentity;

/// Per-tracker configuration, usually loaded from a TOML file.
///
/// ```toml
/// name = "WebKit Bugzilla"
/// url = "https://bugs.webkit.org"
/// radar_importer = "webkit-bug-importer@group.apple.com"
///
/// [[redact]]
/// pattern = "component:Security"
/// value = true
///
/// [[redact_exemption]]
/// pattern = "keywords:.*Public"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Ordered redaction rules; the first match governs.
    #[serde(default)]
    pub redact: Vec<RuleConfig>,
    /// Ordered exemption rules, checked before `redact`.
    #[serde(default)]
    pub redact_exemption: Vec<RuleConfig>,
    /// Username of the account that imports issues into radar.
    #[serde(default)]
    pub radar_importer: Option<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            url: None,
            redact: Vec::new(),
            redact_exemption: Vec::new(),
            radar_importer: None,
            credentials: None,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn identity(&self) -> TrackerIdentity {
        TrackerIdentity::new(self.name.clone(), self.url.clone())
    }

    /// Host part of `url`, without scheme or trailing slash.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        let url = self.url.as_deref()?;
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        let host = rest.trim_end_matches('/');
        (!host.is_empty()).then_some(host)
    }

    /// Compile the rule tables.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first pattern that fails to compile.
    pub fn rules(&self) -> Result<RedactionRules> {
        RedactionRules::compile(&self.redact, &self.redact_exemption)
            .with_context(|| format!("Invalid redaction rules for tracker '{}'", self.name))
    }

    /// Credentials from the file, falling back to the environment.
    #[must_use]
    pub fn resolve_credentials(&self) -> Option<Credentials> {
        self.credentials
            .clone()
            .or_else(|| self.host().and_then(Credentials::from_env))
    }
}

/// One `{ pattern, value }` table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    #[serde(default = "default_true")]
    pub value: bool,
}

impl RuleConfig {
    #[must_use]
    pub fn new(pattern: impl Into<String>, value: bool) -> Self {
        Self {
            pattern: pattern.into(),
            value,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Environment variable prefix for `host`: `bugs.example.com` becomes
    /// `BUGS_EXAMPLE_COM`.
    #[must_use]
    pub fn env_prefix(host: &str) -> String {
        host.replace(['.', '-'], "_").to_ascii_uppercase()
    }

    /// Read `{PREFIX}_USERNAME` and `{PREFIX}_PASSWORD`.
    #[must_use]
    pub fn from_env(host: &str) -> Option<Self> {
        let prefix = Self::env_prefix(host);
        let username = env::var(format!("{prefix}_USERNAME")).ok()?;
        let password = env::var(format!("{prefix}_PASSWORD")).ok()?;
        Some(Self { username, password })
    }

    /// Query fragment carried on authenticated requests.
    #[must_use]
    pub fn query(&self) -> String {
        format!(
            "login={}&password={}",
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }
}

/// Load a tracker config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_tracker_config(path: &Path) -> Result<TrackerConfig> {
    if !path.exists() {
        return Ok(TrackerConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<TrackerConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn default_name() -> String {
    "Bugzilla".to_string()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_tracker_config(&dir.path().join("tracker.toml")).unwrap();
        assert_eq!(config.name, "Bugzilla");
        assert!(config.url.is_none());
        assert!(config.redact.is_empty());
    }

    #[test]
    fn rule_tables_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker.toml");
        fs::write(
            &path,
            r#"
name = "WebKit Bugzilla"
url = "https://bugs.example.com/"

[[redact]]
pattern = "component:Security"

[[redact]]
pattern = ".*"
value = false

[[redact_exemption]]
pattern = "keywords:.*Public"
"#,
        )
        .unwrap();

        let config = load_tracker_config(&path).unwrap();
        assert_eq!(config.host(), Some("bugs.example.com"));
        assert_eq!(
            config.redact,
            vec![
                RuleConfig::new("component:Security", true),
                RuleConfig::new(".*", false),
            ]
        );
        let rules = config.rules().unwrap();
        assert_eq!(rules.redact().len(), 2);
        assert_eq!(rules.exemption()[0].pattern(), "keywords:.*Public");
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker.toml");
        fs::write(&path, "name = [").unwrap();
        let err = load_tracker_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("tracker.toml"));
    }

    #[test]
    fn bad_pattern_is_reported_with_tracker_name() {
        let config = TrackerConfig {
            redact: vec![RuleConfig::new("(", true)],
            ..TrackerConfig::default()
        };
        let err = config.rules().unwrap_err();
        assert!(err.to_string().contains("Bugzilla"));
    }

    #[test]
    fn env_prefix_is_upper_snake_case() {
        assert_eq!(Credentials::env_prefix("bugs.example.com"), "BUGS_EXAMPLE_COM");
        assert_eq!(Credentials::env_prefix("bugs-dev.webkit.org"), "BUGS_DEV_WEBKIT_ORG");
    }

    #[test]
    fn credentials_query_is_encoded() {
        let creds = Credentials::new("tim@example.com", "p&ss");
        assert_eq!(creds.query(), "login=tim%40example.com&password=p%26ss");
        assert!(!format!("{creds:?}").contains("p&ss"));
    }
}

//! Configuration schema (nullcheck.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::diagnostic::{RuleCategory, Severity};
use crate::nullability::NullableContext;

/// Per-rule severity, keyed by rule id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    pub fn get_severity(&self, category: RuleCategory) -> Severity {
        self.overrides
            .get(category.as_str())
            .copied()
            .unwrap_or_else(|| category.default_severity())
    }

    /// Set severity override for a rule
    pub fn set_override(&mut self, category: RuleCategory, severity: Severity) {
        self.overrides.insert(category.as_str().to_string(), severity);
    }
}

/// Rule enablement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Rule identifiers that are never reported
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl RuleSettings {
    /// Check if a rule is enabled
    pub fn is_enabled(&self, category: RuleCategory) -> bool {
        !self
            .disabled
            .iter()
            .any(|id| RuleCategory::from_id(id) == Some(category))
    }

    /// Identifiers in `disabled` that do not name a rule
    pub fn unknown_ids(&self) -> Vec<&str> {
        self.disabled
            .iter()
            .filter(|id| RuleCategory::from_id(id).is_none())
            .map(|id| id.as_str())
            .collect()
    }
}

/// Files excluded from analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowlistRules {
    /// Globs over the path relative to the project root
    #[serde(default)]
    pub skip_files: Vec<String>,
}

impl AllowlistRules {
    pub fn is_file_skipped(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        self.skip_files.iter().any(|pattern| glob_match(pattern, &normalized))
    }
}

fn default_parallel() -> bool {
    true
}

fn default_max_fix_iterations() -> usize {
    256
}

/// Contents of `nullcheck.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Nullable context used where no `#nullable` directive applies
    #[serde(default)]
    pub nullable_context: NullableContext,

    #[serde(default)]
    pub severity: SeverityThreshold,

    #[serde(default)]
    pub rules: RuleSettings,

    #[serde(default)]
    pub allowlist: AllowlistRules,

    /// Also analyze generated files (`*.g.cs`, `<auto-generated>` headers)
    #[serde(default)]
    pub analyze_generated_code: bool,

    /// Classify syntax nodes on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Upper bound on rewrite steps when fixing a single file
    #[serde(default = "default_max_fix_iterations")]
    pub max_fix_iterations: usize,

    /// Directory holding the config file; allowlist globs are relative to it
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nullable_context: NullableContext::default(),
            severity: SeverityThreshold::default(),
            rules: RuleSettings::default(),
            allowlist: AllowlistRules::default(),
            analyze_generated_code: false,
            parallel: default_parallel(),
            max_fix_iterations: default_max_fix_iterations(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Parse and reject unknown rule ids
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(unknown) = config.rules.unknown_ids().first() {
            return Err(ConfigError::UnknownRule(unknown.to_string()));
        }
        if let Some(unknown) = config
            .severity
            .overrides
            .keys()
            .find(|id| RuleCategory::from_id(id).is_none())
        {
            return Err(ConfigError::UnknownRule(unknown.clone()));
        }

        Ok(config)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Whether a rule should be reported at all
    pub fn is_rule_enabled(&self, category: RuleCategory) -> bool {
        self.rules.is_enabled(category)
    }
}

/// `*` matches any run of characters, `/` included
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(mut rest) = parts.next().and_then(|first| text.strip_prefix(first)) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };

    for part in middle.iter().filter(|p| !p.is_empty()) {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access config file: {0}")]
    IoError(String),

    #[error("invalid nullcheck.toml: {0}")]
    ParseError(String),

    #[error("cannot serialize config: {0}")]
    SerializeError(String),

    #[error("unknown rule identifier `{0}` (run `nullcheck rules` for the list)")]
    UnknownRule(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.nullable_context, NullableContext::Disable);
        assert!(config.parallel);
        assert!(!config.analyze_generated_code);
        assert!(RuleCategory::ALL.iter().all(|c| config.is_rule_enabled(*c)));
    }

    #[test]
    fn severity_override() {
        let mut threshold = SeverityThreshold::default();
        threshold.set_override(RuleCategory::NullCheck, Severity::Error);

        assert_eq!(threshold.get_severity(RuleCategory::NullCheck), Severity::Error);
        assert_eq!(threshold.get_severity(RuleCategory::NullCoalesce), Severity::Warn);
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            nullable_context = "enable"
            parallel = false

            [severity.overrides]
            REDUNDANT_NULL_CHECK = "error"

            [rules]
            disabled = ["redundant_null_propagation"]

            [allowlist]
            skip_files = ["Generated/*"]
            "#,
        )
        .unwrap();

        assert_eq!(config.nullable_context, NullableContext::Enable);
        assert!(!config.parallel);
        assert_eq!(config.max_fix_iterations, 256);
        assert_eq!(config.severity.get_severity(RuleCategory::NullCheck), Severity::Error);
        assert!(!config.is_rule_enabled(RuleCategory::NullPropagation));
        assert!(config.is_rule_enabled(RuleCategory::NullCoalesce));
        assert!(config.allowlist.is_file_skipped("Generated/Model.cs"));
    }

    #[test]
    fn unknown_rule_rejected() {
        let err = Config::from_toml("[rules]\ndisabled = [\"NOT_A_RULE\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRule(ref id) if id == "NOT_A_RULE"));
    }

    #[test]
    fn allowlist_pattern_matching() {
        let rules = AllowlistRules {
            skip_files: vec!["legacy/*".to_string(), "src/Old.cs".to_string()],
        };

        assert!(rules.is_file_skipped("legacy/Service.cs"));
        assert!(rules.is_file_skipped("legacy\\Service.cs"));
        assert!(rules.is_file_skipped("src/Old.cs"));
        assert!(!rules.is_file_skipped("src/New.cs"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config.nullable_context, parsed.nullable_context);
        assert_eq!(config.max_fix_iterations, parsed.max_fix_iterations);
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("*.g.cs", "Model.g.cs"));
        assert!(glob_match("obj/**", "obj/Debug/x.cs"));
        assert!(!glob_match("obj/*", "src/x.cs"));
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("**/Migrations/*.cs", "src/Data/Migrations/Initial.cs"));
        assert!(!glob_match("**/Migrations/*.cs", "src/Data/Migrations.cs"));
        assert!(glob_match("src/Old.cs", "src/Old.cs"));
        assert!(!glob_match("src/Old.cs", "src/Old.cs.bak"));
    }
}

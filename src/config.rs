//! Typed view over `ansible-config dump` output.

use std::collections::BTreeMap;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use crate::env::EnvStore;
use crate::errors::{AnsibleCompatError, Result};
use crate::version::AnsibleVersion;

static DUMP_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z0-9_]+)\(([^)]+)\) = (.*)$").unwrap());

static PYTHON_CONSTANT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(True|False|None)\b").unwrap());

/// Effective Ansible configuration, keyed by upper-case setting name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnsibleConfig {
    values: BTreeMap<String, Value>,
    origins: BTreeMap<String, String>,
}

impl AnsibleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the output of `ansible-config dump`.
    ///
    /// Lines look like `DEFAULT_FORKS(default) = 5`; anything else is ignored.
    pub fn from_dump(text: &str) -> Self {
        let mut config = AnsibleConfig::new();
        for line in text.lines() {
            let Some(caps) = DUMP_LINE_RE.captures(line.trim_end()) else {
                if !line.trim().is_empty() {
                    debug!("Ignoring unrecognized config line: {}", line);
                }
                continue;
            };
            let key = caps[1].to_string();
            config.origins.insert(key.clone(), caps[2].to_string());
            config.values.insert(key, parse_config_value(&caps[3]));
        }
        debug!("Loaded {} ansible config values", config.values.len());
        config
    }

    /// Case-insensitive lookup of a setting.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&name.to_uppercase())
    }

    /// Where a setting came from (`default`, `env: ...`, a config file path).
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.origins.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_uppercase(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw collections path setting, whichever alias the installed Ansible uses.
    pub fn collections_path_value(&self) -> Option<&Value> {
        self.get("COLLECTIONS_PATHS")
            .or_else(|| self.get("COLLECTIONS_PATH"))
    }

    /// Collection search paths; the setting must be a list of strings.
    pub fn collections_path(&self) -> Result<Vec<String>> {
        match self.collections_path_value() {
            None => Ok(Vec::new()),
            Some(value) => string_list(value).ok_or_else(|| {
                AnsibleCompatError::InvalidConfig(format!(
                    "Unexpected collection_path value: {}",
                    render(value)
                ))
            }),
        }
    }

    pub fn default_roles_path(&self) -> Result<Vec<String>> {
        match self.get("DEFAULT_ROLES_PATH") {
            None => Ok(Vec::new()),
            Some(value) => string_list(value).ok_or_else(|| {
                AnsibleCompatError::InvalidConfig(format!(
                    "Unexpected roles_path value: {}",
                    render(value)
                ))
            }),
        }
    }
}

/// Convert a Python literal as printed by `ansible-config` into a YAML value.
pub fn parse_config_value(text: &str) -> Value {
    let text = text.trim();
    match text {
        "True" => return Value::Bool(true),
        "False" => return Value::Bool(false),
        "None" => return Value::Null,
        "" => return Value::String(String::new()),
        _ => {}
    }

    if text.starts_with('[') || text.starts_with('{') {
        let normalized = PYTHON_CONSTANT_RE.replace_all(text, |caps: &regex::Captures| {
            match &caps[1] {
                "True" => "true",
                "False" => "false",
                _ => "null",
            }
            .to_string()
        });
        match serde_yaml::from_str::<Value>(&normalized) {
            Ok(value) => return value,
            Err(e) => warn!("Unable to parse config value {}: {}", text, e),
        }
    }

    if let Ok(number) = text.parse::<i64>() {
        return Value::Number(number.into());
    }
    if let Ok(number) = text.parse::<f64>() {
        return Value::Number(number.into());
    }
    Value::String(text.to_string())
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Human-readable form of a config value for messages.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}

/// Name of the environment variable holding collection search paths.
///
/// Ansible 2.10 renamed `ANSIBLE_COLLECTIONS_PATHS` to
/// `ANSIBLE_COLLECTIONS_PATH`. A variable the user already set wins, plural
/// first; otherwise the name matching `version` is used.
pub fn ansible_collections_path<E: EnvStore + ?Sized>(
    env: &E,
    version: &AnsibleVersion,
) -> &'static str {
    for name in ["ANSIBLE_COLLECTIONS_PATHS", "ANSIBLE_COLLECTIONS_PATH"] {
        if env.contains(name) {
            return name;
        }
    }
    if version.major() > 2 || (version.major() == 2 && version.minor() >= 10) {
        "ANSIBLE_COLLECTIONS_PATH"
    } else {
        "ANSIBLE_COLLECTIONS_PATHS"
    }
}

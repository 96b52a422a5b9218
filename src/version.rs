//! Parsing of `ansible --version` output and Ansible version numbers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::ANSIBLE_MIN_VERSION;

static ANSIBLE_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^ansible(?: \[(?:core|base)\])? (\S+)").unwrap()
});

// release part, then an optional PEP 440 pre/dev suffix
static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.?(a|b|rc|dev)\.?(\d+))?(?:\+.*)?$")
        .unwrap()
});

/// Extract the version string from `ansible --version` output.
///
/// Handles the 2.9 (`ansible 2.9.27`), 2.10 (`ansible [base] 2.10.0`) and
/// later (`ansible [core] 2.14.1`) formats.
pub fn parse_ansible_version(stdout: &str) -> Result<String, String> {
    match ANSIBLE_VERSION_RE.captures(stdout) {
        Some(caps) => Ok(caps[1].to_string()),
        None => Err(format!(
            "FATAL: Unable to parse ansible cli version: {}\nKeep in mind that only {} or newer are supported.",
            stdout, ANSIBLE_MIN_VERSION
        )),
    }
}

/// An Ansible release number such as `2.14.1` or `2.15.0rc1`.
///
/// Equality and ordering ignore spelling: `2.12` equals `2.12.0`.
#[derive(Debug, Clone)]
pub struct AnsibleVersion {
    raw: String,
    inner: semver::Version,
}

impl AnsibleVersion {
    /// Parse a version written either as SemVer (`1.0.0-beta.1`, used by
    /// galaxy collections) or in the PEP 440 subset Ansible itself uses
    /// (`2.15.0rc1`, `2.17.0.dev0`, `2.9`).
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if let Ok(inner) = semver::Version::parse(text) {
            return Ok(AnsibleVersion {
                raw: text.to_string(),
                inner,
            });
        }

        let caps = VERSION_RE
            .captures(text)
            .ok_or_else(|| format!("Invalid version: '{}'", text))?;

        let number = |i: usize| -> Result<u64, String> {
            caps.get(i)
                .map_or(Ok(0), |m| m.as_str().parse::<u64>())
                .map_err(|e| format!("Invalid version '{}': {}", text, e))
        };

        let mut inner = semver::Version::new(number(1)?, number(2)?, number(3)?);
        if let Some(kind) = caps.get(4) {
            // "dev" must sort before "a", "b" and "rc", as in PEP 440.
            let tag = match kind.as_str() {
                "dev" => "0dev",
                other => other,
            };
            let pre = format!("{}.{}", tag, number(5)?);
            inner.pre = semver::Prerelease::new(&pre)
                .map_err(|e| format!("Invalid version '{}': {}", text, e))?;
        }

        Ok(AnsibleVersion {
            raw: text.to_string(),
            inner,
        })
    }

    pub fn major(&self) -> u64 {
        self.inner.major
    }

    pub fn minor(&self) -> u64 {
        self.inner.minor
    }

    pub fn patch(&self) -> u64 {
        self.inner.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.inner.pre.is_empty()
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.inner
    }
}

impl FromStr for AnsibleVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnsibleVersion::parse(s)
    }
}

impl fmt::Display for AnsibleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for AnsibleVersion {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for AnsibleVersion {}

impl PartialOrd for AnsibleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnsibleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
